use std::sync::Arc;

use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, StringArray};
use arrow_schema::{ArrowError, DataType, Field, Schema};

use passagedb_core::types::RecordId;

/// A row staged in a transaction, waiting for its id.
#[derive(Debug, Clone)]
pub struct PendingRow {
	pub article_name: String,
	pub content: String,
	pub vector: Vec<f32>,
}

pub fn build_passage_schema(dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Int64, false),
		Field::new("article_name", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), true),
	]))
}

/// Builds one batch assigning `first_id..` to `rows` in order.
pub fn rows_to_batch(rows: &[PendingRow], first_id: RecordId, dim: usize) -> Result<RecordBatch, ArrowError> {
	let schema = build_passage_schema(dim);
	let ids: Vec<RecordId> = (0..rows.len() as RecordId).map(|i| first_id + i).collect();
	let names: Vec<&str> = rows.iter().map(|r| r.article_name.as_str()).collect();
	let contents: Vec<&str> = rows.iter().map(|r| r.content.as_str()).collect();
	let vectors = rows.iter().map(|r| Some(r.vector.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	RecordBatch::try_new(schema, vec![
		Arc::new(Int64Array::from(ids)),
		Arc::new(StringArray::from(names)),
		Arc::new(StringArray::from(contents)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim as i32)),
	])
}
