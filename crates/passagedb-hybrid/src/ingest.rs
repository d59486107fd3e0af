use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use passagedb_core::chunking::{passages, read_document};
use passagedb_core::error::{Error, Result};
use passagedb_core::ident::TableName;
use passagedb_core::traits::{Chunker, Embedder, PassageStore, StoreTransaction};
use passagedb_core::types::{Document, Passage, RecordId};

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document: String,
    pub table: TableName,
    pub inserted: usize,
    pub ids: Vec<RecordId>,
}

/// Chunk, embed and store documents, one store transaction per document.
pub struct IngestionPipeline<S: PassageStore> {
    store: Arc<S>,
    embedder: Arc<dyn Embedder>,
    chunker: Arc<dyn Chunker>,
}

impl<S: PassageStore> IngestionPipeline<S> {
    pub fn new(store: Arc<S>, embedder: Arc<dyn Embedder>, chunker: Arc<dyn Chunker>) -> Self {
        Self { store, embedder, chunker }
    }

    /// Stores every passage of the document or none of them.
    ///
    /// A document that chunks to nothing succeeds with zero rows and opens
    /// no transaction. If any passage fails to embed or insert, the
    /// transaction is rolled back and `PartialIngestion` names the passage.
    pub async fn ingest(&self, document_name: &str, raw_text: &str, table: &TableName) -> Result<IngestReport> {
        let document = Document { name: document_name.to_string(), raw_text: raw_text.to_string() };
        self.ingest_document(&document, table).await
    }

    /// Reads `path` (lossy UTF-8) and ingests it, named `name` or the file name.
    pub async fn ingest_file(&self, path: &Path, table: &TableName, name: Option<&str>) -> Result<IngestReport> {
        let document = read_document(path, name)?;
        self.ingest_document(&document, table).await
    }

    pub async fn ingest_document(&self, document: &Document, table: &TableName) -> Result<IngestReport> {
        let passages = passages(self.chunker.as_ref(), document);
        let total = passages.len();
        if total == 0 {
            info!(document = %document.name, %table, "document produced no passages");
            return Ok(IngestReport { document: document.name.clone(), table: table.clone(), inserted: 0, ids: Vec::new() });
        }
        debug!(document = %document.name, passages = total, embedder = self.embedder.name(), "ingesting");

        let mut tx = self.store.begin(table).await?;
        for (i, passage) in passages.iter().enumerate() {
            if let Err(source) = self.embed_and_insert(&mut tx, passage).await {
                warn!(document = %document.name, passage = i + 1, total, error = %source, "rolling back document");
                if let Err(e) = tx.rollback().await {
                    warn!(document = %document.name, error = %e, "rollback failed");
                }
                return Err(Error::PartialIngestion {
                    document: document.name.clone(),
                    passage: i + 1,
                    total,
                    source: Box::new(source),
                });
            }
        }
        let ids = tx.commit().await?;
        info!(document = %document.name, %table, inserted = ids.len(), "ingested document");
        Ok(IngestReport { document: document.name.clone(), table: table.clone(), inserted: ids.len(), ids })
    }

    async fn embed_and_insert(&self, tx: &mut S::Tx, passage: &Passage) -> Result<()> {
        let embedding = self.embedder.embed(&passage.text).await?;
        if embedding.len() != self.embedder.dim() {
            return Err(Error::validation(format!(
                "embedder {} returned dimension {}, expected {}",
                self.embedder.name(),
                embedding.len(),
                self.embedder.dim()
            )));
        }
        tx.insert(&passage.source_document_name, &passage.text, embedding).await
    }
}
