//! passagedb-vector
//!
//! LanceDB-backed passage store. Rows and their embeddings live in one Lance
//! table per [`TableName`](passagedb_core::TableName); lexical ranking is
//! delegated to the table's Tantivy indexes from `passagedb-text`.
pub mod schema;
pub mod store;
pub mod table;

pub use store::{LanceStore, LanceTransaction};
