#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use passagedb_core::error::{Error, Result, Stage};
use passagedb_core::ident::{IndexName, TableName};
use passagedb_core::traits::{Chunker, Embedder, PassageStore, StoreTransaction};
use passagedb_core::types::{RecordId, StoreHit, StoredRecord};

pub const DIM: usize = 4;

pub fn hit(id: RecordId, content: &str, score: f32) -> StoreHit {
    StoreHit { id, content: content.to_string(), score }
}

pub fn table() -> TableName {
    TableName::new("articles").unwrap()
}

/// In-memory store returning canned ranking lists and recording every call.
#[derive(Default)]
pub struct ScriptedStore {
    pub semantic_hits: Vec<StoreHit>,
    pub lexical_hits: Vec<StoreHit>,
    pub fail_semantic: bool,
    pub fail_lexical: bool,
    pub fail_commit: bool,
    pub ranking_delay: Option<Duration>,
    pub semantic_calls: AtomicUsize,
    pub lexical_calls: AtomicUsize,
    pub begins: AtomicUsize,
    pub rollbacks: Arc<AtomicUsize>,
    pub limits: Mutex<Vec<usize>>,
    pub rows: Arc<Mutex<Vec<StoredRecord>>>,
}

impl ScriptedStore {
    pub fn with_lists(semantic_hits: Vec<StoreHit>, lexical_hits: Vec<StoreHit>) -> Self {
        Self { semantic_hits, lexical_hits, ..Self::default() }
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    async fn pause(&self) {
        if let Some(d) = self.ranking_delay {
            tokio::time::sleep(d).await;
        }
    }
}

pub struct ScriptedTx {
    pending: Vec<(String, String, Vec<f32>)>,
    rows: Arc<Mutex<Vec<StoredRecord>>>,
    rollbacks: Arc<AtomicUsize>,
    fail_commit: bool,
}

#[async_trait]
impl StoreTransaction for ScriptedTx {
    async fn insert(&mut self, article_name: &str, content: &str, embedding: Vec<f32>) -> Result<()> {
        self.pending.push((article_name.to_string(), content.to_string(), embedding));
        Ok(())
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn commit(self) -> Result<Vec<RecordId>> {
        if self.fail_commit {
            return Err(Error::connectivity(Stage::Store, "connection reset during commit"));
        }
        let mut rows = self.rows.lock().unwrap();
        let mut ids = Vec::new();
        for (article_name, content, embedding) in self.pending {
            let id = rows.len() as RecordId + 1;
            rows.push(StoredRecord { id, article_name, content, embedding });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn rollback(self) -> Result<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PassageStore for ScriptedStore {
    type Tx = ScriptedTx;

    async fn begin(&self, _table: &TableName) -> Result<ScriptedTx> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedTx {
            pending: Vec::new(),
            rows: Arc::clone(&self.rows),
            rollbacks: Arc::clone(&self.rollbacks),
            fail_commit: self.fail_commit,
        })
    }

    async fn rank_by_vector_distance(&self, _table: &TableName, _v: &[f32], limit: usize) -> Result<Vec<StoreHit>> {
        self.semantic_calls.fetch_add(1, Ordering::SeqCst);
        self.limits.lock().unwrap().push(limit);
        self.pause().await;
        if self.fail_semantic {
            return Err(Error::query(Stage::SemanticRanking, "vector column missing"));
        }
        Ok(self.semantic_hits.iter().take(limit).cloned().collect())
    }

    async fn rank_by_term_relevance(
        &self,
        _table: &TableName,
        _query: &str,
        index: &IndexName,
        limit: usize,
    ) -> Result<Vec<StoreHit>> {
        self.lexical_calls.fetch_add(1, Ordering::SeqCst);
        self.limits.lock().unwrap().push(limit);
        self.pause().await;
        if self.fail_lexical {
            return Err(Error::query(Stage::LexicalRanking, format!("lexical index '{index}' does not exist")));
        }
        Ok(self.lexical_hits.iter().take(limit).cloned().collect())
    }
}

/// Embedder that counts calls and can fail or misbehave on a chosen call.
pub struct CountingEmbedder {
    pub calls: AtomicUsize,
    /// 1-based call number that returns a connectivity error.
    pub fail_on: Option<usize>,
    /// 1-based call number that returns a vector of the wrong length.
    pub wrong_dim_on: Option<usize>,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0), fail_on: None, wrong_dim_on: None }
    }

    pub fn failing_on(n: usize) -> Self {
        Self { fail_on: Some(n), ..Self::new() }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "counting"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(n) {
            return Err(Error::connectivity(Stage::Embedder, "embedding service unavailable"));
        }
        if self.wrong_dim_on == Some(n) {
            return Ok(vec![0.0; DIM + 1]);
        }
        Ok(vec![text.len() as f32, 1.0, 0.0, 0.0])
    }
}

/// Splits on blank lines, one passage per paragraph.
pub struct LineChunker;

impl Chunker for LineChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect()
    }
}
