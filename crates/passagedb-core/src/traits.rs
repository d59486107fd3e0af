use async_trait::async_trait;

use crate::error::Result;
use crate::ident::{IndexName, TableName};
use crate::types::{RecordId, StoreHit};

/// Splits raw document text into ordered passages.
pub trait Chunker: Send + Sync {
    fn chunk(&self, text: &str) -> Vec<String>;
}

/// Turns a passage or query into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;

    /// Short label for logs, e.g. `http:text-embedding-v4`.
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}

/// A caller-managed unit of work against one table.
///
/// Nothing inserted becomes visible until `commit`; dropping or rolling
/// back discards every pending row.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn insert(&mut self, article_name: &str, content: &str, embedding: Vec<f32>) -> Result<()>;

    /// Number of rows pending in this transaction.
    fn pending(&self) -> usize;

    /// Persists all pending rows at once and returns their ids in insert order.
    async fn commit(self) -> Result<Vec<RecordId>>;

    async fn rollback(self) -> Result<()>;
}

/// Persistent passage storage with native ranking queries.
#[async_trait]
pub trait PassageStore: Send + Sync {
    type Tx: StoreTransaction;

    async fn begin(&self, table: &TableName) -> Result<Self::Tx>;

    /// Nearest neighbours by vector distance, ascending.
    async fn rank_by_vector_distance(
        &self,
        table: &TableName,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoreHit>>;

    /// Term relevance against the named lexical index, descending.
    async fn rank_by_term_relevance(
        &self,
        table: &TableName,
        query_text: &str,
        index: &IndexName,
        limit: usize,
    ) -> Result<Vec<StoreHit>>;
}
