use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use passagedb_core::config::RetrievalSettings;
use passagedb_core::error::{Error, Result, Stage};
use passagedb_core::ident::{IndexName, TableName};
use passagedb_core::traits::{Embedder, PassageStore};
use passagedb_core::types::{FusedResult, RankedCandidate, RetrievalSource, SearchMode};

use crate::fusion::{fuse, rank_candidates, score_single, RrfParams};

/// One retrieval request. Identifiers are validated when the request is built.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub table: TableName,
    pub index: IndexName,
    pub top_k: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, mode: SearchMode, table: &str, index: &str, top_k: usize) -> Result<Self> {
        let request = Self { query: query.into(), mode, table: TableName::new(table)?, index: IndexName::new(index)?, top_k };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::validation("query must not be empty"));
        }
        if self.top_k == 0 {
            return Err(Error::validation("top_k must be at least 1"));
        }
        Ok(())
    }
}

/// Lexical, semantic or RRF-fused retrieval over a [`PassageStore`].
pub struct HybridSearchEngine<S: PassageStore> {
    store: Arc<S>,
    embedder: Arc<dyn Embedder>,
    params: RrfParams,
    query_timeout: Duration,
}

impl<S: PassageStore> HybridSearchEngine<S> {
    pub fn new(store: Arc<S>, embedder: Arc<dyn Embedder>, settings: &RetrievalSettings) -> Self {
        Self {
            store,
            embedder,
            params: RrfParams::from(settings),
            query_timeout: Duration::from_millis(settings.query_timeout_ms),
        }
    }

    /// Runs `request` within the configured query timeout.
    ///
    /// An empty result is `Ok(vec![])`; any collaborator failure is returned
    /// as-is and never retried. Dropping the returned future cancels both
    /// ranking branches.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<FusedResult>> {
        request.validate()?;
        let results = tokio::time::timeout(self.query_timeout, self.run(request))
            .await
            .map_err(|_| {
                Error::connectivity(Stage::Store, format!("search did not finish within {} ms", self.query_timeout.as_millis()))
            })??;
        info!(table = %request.table, mode = %request.mode, results = results.len(), "search complete");
        Ok(results)
    }

    async fn run(&self, request: &SearchRequest) -> Result<Vec<FusedResult>> {
        let top_k = request.top_k;
        match request.mode {
            SearchMode::Lexical => {
                let candidates = self.lexical(request, top_k).await?;
                Ok(score_single(&candidates, &self.params, top_k))
            }
            SearchMode::Semantic => {
                let candidates = self.semantic(request, top_k).await?;
                Ok(score_single(&candidates, &self.params, top_k))
            }
            SearchMode::Hybrid => {
                let pool = self.params.pool_size(top_k);
                let (semantic, lexical) = tokio::try_join!(self.semantic(request, pool), self.lexical(request, pool))?;
                Ok(fuse(&semantic, &lexical, &self.params, top_k))
            }
        }
    }

    async fn semantic(&self, request: &SearchRequest, limit: usize) -> Result<Vec<RankedCandidate>> {
        let vector = self.embedder.embed(&request.query).await?;
        if vector.len() != self.embedder.dim() {
            return Err(Error::validation(format!(
                "query embedding has dimension {}, embedder {} declares {}",
                vector.len(),
                self.embedder.name(),
                self.embedder.dim()
            )));
        }
        let hits = self.store.rank_by_vector_distance(&request.table, &vector, limit).await?;
        debug!(table = %request.table, limit, candidates = hits.len(), "semantic candidates");
        Ok(rank_candidates(hits, RetrievalSource::Semantic))
    }

    async fn lexical(&self, request: &SearchRequest, limit: usize) -> Result<Vec<RankedCandidate>> {
        let hits = self.store.rank_by_term_relevance(&request.table, &request.query, &request.index, limit).await?;
        debug!(table = %request.table, index = %request.index, limit, candidates = hits.len(), "lexical candidates");
        Ok(rank_candidates(hits, RetrievalSource::Lexical))
    }
}
