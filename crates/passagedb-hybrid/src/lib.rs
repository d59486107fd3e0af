//! passagedb-hybrid
//!
//! Ingestion pipeline and the hybrid retrieval engine. Both are generic over
//! [`PassageStore`](passagedb_core::traits::PassageStore) and take the
//! embedder as a trait object, so tests can swap either collaborator.
pub mod engine;
pub mod fusion;
pub mod ingest;

pub use engine::{HybridSearchEngine, SearchRequest};
pub use fusion::RrfParams;
pub use ingest::{IngestReport, IngestionPipeline};
