use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::{Array, RecordBatchIterator};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use passagedb_core::config::StoreSettings;
use passagedb_core::error::{Error, Result, Stage};
use passagedb_core::ident::{IndexName, TableName};
use passagedb_core::traits::{PassageStore, StoreTransaction};
use passagedb_core::types::{RecordId, StoreHit};
use passagedb_text::{Analyzer, LexicalCatalog, LexicalIndex, LexicalWriter};

use crate::schema::{build_passage_schema, rows_to_batch, PendingRow};
use crate::table::{ensure_table, f32_column, i64_column, max_id, open_db, open_table, scan_rows, string_column};

fn semantic_err(e: impl std::fmt::Display) -> Error {
    Error::query(Stage::SemanticRanking, e.to_string())
}

/// Highest id handed out per table by this process.
type IdWatermarks = HashMap<TableName, RecordId>;

type StagedWriter = (IndexName, Arc<LexicalIndex>, LexicalWriter);

/// LanceDB rows and vectors plus Tantivy lexical indexes, kept in step.
///
/// Every commit takes the store's write lock, assigns ids after the largest
/// id ever seen, appends one Lance version and then commits each lexical
/// index of the table. A failed append rolls the lexical writers back; a
/// failed lexical commit deletes the appended id range again.
#[derive(Clone)]
pub struct LanceStore {
    conn: Connection,
    catalog: Arc<LexicalCatalog>,
    writes: Arc<Mutex<IdWatermarks>>,
    dim: usize,
}

impl LanceStore {
    pub async fn open(settings: &StoreSettings) -> Result<Self> {
        let uri = settings.uri_path();
        std::fs::create_dir_all(&uri)
            .map_err(|e| Error::connectivity(Stage::Store, format!("cannot create {}: {e}", uri.display())))?;
        let conn = open_db(&uri.to_string_lossy()).await?;
        let catalog = Arc::new(LexicalCatalog::new(settings.lexical_path()));
        info!(uri = %uri.display(), lexical = %catalog.root().display(), dim = settings.dim, "opened passage store");
        Ok(Self { conn, catalog, writes: Arc::new(Mutex::new(HashMap::new())), dim: settings.dim })
    }

    /// Creates an empty passage table; returns `false` if it already existed.
    pub async fn create_table(&self, table: &TableName) -> Result<bool> {
        let created = ensure_table(&self.conn, table, build_passage_schema(self.dim)).await?;
        if created {
            info!(%table, dim = self.dim, "created passage table");
        }
        Ok(created)
    }

    /// Creates a lexical index over `content` and fills it from existing rows.
    /// Returns `false` if the index already existed.
    pub async fn create_lexical_index(&self, table: &TableName, index: &IndexName, analyzer: Analyzer) -> Result<bool> {
        let lance = open_table(&self.conn, table, Stage::Store).await?;
        let _guard = self.writes.lock().await;
        if self.catalog.exists(table, index) {
            return Ok(false);
        }
        let rows = scan_rows(&lance).await?;
        let created = self.catalog.create(table, index, analyzer)?;
        let mut writer = created.writer()?;
        for (id, article_name, content) in &rows {
            writer.add(*id, article_name, content)?;
        }
        writer.commit()?;
        info!(%table, %index, backfilled = rows.len(), "lexical index ready");
        Ok(true)
    }

    pub async fn count_rows(&self, table: &TableName) -> Result<usize> {
        let lance = open_table(&self.conn, table, Stage::Store).await?;
        lance.count_rows(None).await.map_err(|e| Error::query(Stage::Store, e.to_string()))
    }

    async fn commit_rows(&self, table: &TableName, rows: Vec<PendingRow>) -> Result<Vec<RecordId>> {
        let mut watermarks = self.writes.lock().await;
        let lance = open_table(&self.conn, table, Stage::Store).await?;
        let first = next_id(&watermarks, table, &lance).await?;
        let last = first + rows.len() as RecordId - 1;
        let ids: Vec<RecordId> = (first..=last).collect();

        let mut writers: Vec<StagedWriter> = Vec::new();
        if let Err(e) = self.stage_lexical(table, &ids, &rows, &mut writers) {
            rollback_writers(writers);
            return Err(e);
        }

        let batch = match rows_to_batch(&rows, first, self.dim) {
            Ok(b) => b,
            Err(e) => {
                rollback_writers(writers);
                return Err(Error::validation(format!("cannot build row batch: {e}")));
            }
        };
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if let Err(e) = lance.add(reader).execute().await {
            rollback_writers(writers);
            return Err(Error::query(Stage::Store, format!("append to '{table}' failed: {e}")));
        }
        watermarks.insert(table.clone(), last);

        let mut committed: Vec<Arc<LexicalIndex>> = Vec::new();
        let mut remaining = writers.into_iter();
        while let Some((name, index, writer)) = remaining.next() {
            if let Err(e) = writer.commit() {
                error!(%table, index = %name, error = %e, "lexical commit failed, removing appended rows");
                rollback_writers(remaining.collect());
                compensate(&lance, &committed, &ids).await;
                return Err(e);
            }
            committed.push(index);
        }
        info!(%table, first, last, "committed passages");
        Ok(ids)
    }

    fn stage_lexical(
        &self,
        table: &TableName,
        ids: &[RecordId],
        rows: &[PendingRow],
        writers: &mut Vec<StagedWriter>,
    ) -> Result<()> {
        for (name, index) in self.catalog.indexes_for(table)? {
            let mut writer = index.writer()?;
            for (id, row) in ids.iter().zip(rows) {
                writer.add(*id, &row.article_name, &row.content)?;
            }
            debug!(%table, index = %name, staged = writer.pending(), "staged lexical documents");
            writers.push((name, index, writer));
        }
        Ok(())
    }
}

async fn next_id(watermarks: &IdWatermarks, table: &TableName, lance: &Table) -> Result<RecordId> {
    let stored = max_id(lance).await?.unwrap_or(0);
    let seen = watermarks.get(table).copied().unwrap_or(0);
    Ok(stored.max(seen) + 1)
}

/// Undoes an append whose lexical commit failed part-way.
async fn compensate(lance: &Table, committed: &[Arc<LexicalIndex>], ids: &[RecordId]) {
    let (Some(first), Some(last)) = (ids.first(), ids.last()) else { return };
    if let Err(e) = lance.delete(&format!("id >= {first} AND id <= {last}")).await {
        error!(first, last, error = %e, "could not remove appended rows");
    }
    for index in committed {
        let undo = index.writer().and_then(|mut w| {
            w.delete_ids(ids);
            w.commit()
        });
        if let Err(e) = undo {
            error!(error = %e, "could not remove lexical documents");
        }
    }
}

fn rollback_writers(writers: Vec<StagedWriter>) {
    for (name, _, writer) in writers {
        if let Err(e) = writer.rollback() {
            warn!(index = %name, error = %e, "lexical rollback failed");
        }
    }
}

/// Rows staged for one table; nothing touches disk before `commit`.
pub struct LanceTransaction {
    store: LanceStore,
    table: TableName,
    rows: Vec<PendingRow>,
}

#[async_trait]
impl StoreTransaction for LanceTransaction {
    async fn insert(&mut self, article_name: &str, content: &str, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.store.dim {
            return Err(Error::validation(format!(
                "embedding has dimension {}, table '{}' expects {}",
                embedding.len(),
                self.table,
                self.store.dim
            )));
        }
        self.rows.push(PendingRow { article_name: article_name.to_string(), content: content.to_string(), vector: embedding });
        Ok(())
    }

    fn pending(&self) -> usize {
        self.rows.len()
    }

    async fn commit(self) -> Result<Vec<RecordId>> {
        if self.rows.is_empty() {
            return Ok(Vec::new());
        }
        self.store.commit_rows(&self.table, self.rows).await
    }

    async fn rollback(self) -> Result<()> {
        debug!(table = %self.table, discarded = self.rows.len(), "transaction rolled back");
        Ok(())
    }
}

#[async_trait]
impl PassageStore for LanceStore {
    type Tx = LanceTransaction;

    async fn begin(&self, table: &TableName) -> Result<LanceTransaction> {
        open_table(&self.conn, table, Stage::Store).await?;
        Ok(LanceTransaction { store: self.clone(), table: table.clone(), rows: Vec::new() })
    }

    async fn rank_by_vector_distance(&self, table: &TableName, query_vector: &[f32], limit: usize) -> Result<Vec<StoreHit>> {
        if query_vector.len() != self.dim {
            return Err(Error::validation(format!(
                "query vector has dimension {}, store expects {}",
                query_vector.len(),
                self.dim
            )));
        }
        let lance = open_table(&self.conn, table, Stage::SemanticRanking).await?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut stream = lance
            .vector_search(query_vector.to_vec())
            .map_err(semantic_err)?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(semantic_err)?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(semantic_err)? {
            let ids = i64_column(&batch, "id", Stage::SemanticRanking)?;
            let contents = string_column(&batch, "content", Stage::SemanticRanking)?;
            let distances = f32_column(&batch, "_distance", Stage::SemanticRanking)?;
            for i in 0..batch.num_rows() {
                let score = if distances.is_null(i) { f32::INFINITY } else { distances.value(i) };
                hits.push(StoreHit { id: ids.value(i), content: contents.value(i).to_string(), score });
            }
        }
        hits.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        debug!(%table, hits = hits.len(), "vector ranking");
        Ok(hits)
    }

    async fn rank_by_term_relevance(
        &self,
        table: &TableName,
        query_text: &str,
        index: &IndexName,
        limit: usize,
    ) -> Result<Vec<StoreHit>> {
        open_table(&self.conn, table, Stage::LexicalRanking).await?;
        let lexical = self.catalog.open(table, index)?;
        let query = query_text.to_string();
        tokio::task::spawn_blocking(move || lexical.search(&query, limit))
            .await
            .map_err(|e| Error::query(Stage::LexicalRanking, format!("lexical search task failed: {e}")))?
    }
}
