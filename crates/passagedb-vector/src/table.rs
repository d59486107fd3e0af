//! LanceDB connection and table helpers.
//!
//! Open the database, create passage tables, and read columns back out of
//! result batches without panicking on unexpected shapes.
use std::sync::Arc;

use arrow_array::{Array, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, Table};

use passagedb_core::error::{Error, Result, Stage};
use passagedb_core::ident::TableName;
use passagedb_core::types::RecordId;

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri)
        .execute()
        .await
        .map_err(|e| Error::connectivity(Stage::Store, format!("cannot open LanceDB at {uri}: {e}")))
}

pub async fn table_exists(conn: &Connection, name: &TableName) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(|e| Error::connectivity(Stage::Store, e.to_string()))?;
    Ok(names.iter().any(|n| n == name.as_str()))
}

/// Creates an empty table with `schema` unless one already exists; returns
/// whether it was created.
pub async fn ensure_table(conn: &Connection, name: &TableName, schema: Arc<arrow_schema::Schema>) -> Result<bool> {
    if table_exists(conn, name).await? {
        return Ok(false);
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name.as_str(), Box::new(iter))
        .execute()
        .await
        .map_err(|e| Error::query(Stage::Store, format!("cannot create table '{name}': {e}")))?;
    Ok(true)
}

/// Opens `name`, reporting a missing table as a `QueryExecution` error of `stage`.
pub async fn open_table(conn: &Connection, name: &TableName, stage: Stage) -> Result<Table> {
    if !table_exists(conn, name).await? {
        return Err(Error::query(stage, format!("table '{name}' does not exist")));
    }
    conn.open_table(name.as_str())
        .execute()
        .await
        .map_err(|e| Error::query(stage, format!("cannot open table '{name}': {e}")))
}

/// Largest id stored in `table`, if any rows exist.
pub async fn max_id(table: &Table) -> Result<Option<RecordId>> {
    let mut stream = table
        .query()
        .select(Select::columns(&["id"]))
        .execute()
        .await
        .map_err(|e| Error::query(Stage::Store, e.to_string()))?;
    let mut max: Option<RecordId> = None;
    while let Some(batch) = stream.try_next().await.map_err(|e| Error::query(Stage::Store, e.to_string()))? {
        let ids = i64_column(&batch, "id", Stage::Store)?;
        for i in 0..ids.len() {
            let id = ids.value(i);
            max = Some(max.map_or(id, |m| m.max(id)));
        }
    }
    Ok(max)
}

/// Every `(id, article_name, content)` row, used to backfill a new lexical index.
pub async fn scan_rows(table: &Table) -> Result<Vec<(RecordId, String, String)>> {
    let mut stream = table
        .query()
        .select(Select::columns(&["id", "article_name", "content"]))
        .execute()
        .await
        .map_err(|e| Error::query(Stage::Store, e.to_string()))?;
    let mut rows = Vec::new();
    while let Some(batch) = stream.try_next().await.map_err(|e| Error::query(Stage::Store, e.to_string()))? {
        let ids = i64_column(&batch, "id", Stage::Store)?;
        let names = string_column(&batch, "article_name", Stage::Store)?;
        let contents = string_column(&batch, "content", Stage::Store)?;
        for i in 0..batch.num_rows() {
            rows.push((ids.value(i), names.value(i).to_string(), contents.value(i).to_string()));
        }
    }
    Ok(rows)
}

fn missing(name: &str, stage: Stage) -> Error {
    Error::query(stage, format!("result batch has no usable '{name}' column"))
}

pub fn i64_column<'a>(batch: &'a RecordBatch, name: &str, stage: Stage) -> Result<&'a Int64Array> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Int64Array>()).ok_or_else(|| missing(name, stage))
}

pub fn string_column<'a>(batch: &'a RecordBatch, name: &str, stage: Stage) -> Result<&'a StringArray> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| missing(name, stage))
}

pub fn f32_column<'a>(batch: &'a RecordBatch, name: &str, stage: Stage) -> Result<&'a Float32Array> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| missing(name, stage))
}
