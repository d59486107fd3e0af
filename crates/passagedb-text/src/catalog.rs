use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use passagedb_core::error::{Error, Result, Stage};
use passagedb_core::ident::{IndexName, TableName};

use crate::index::LexicalIndex;
use crate::tantivy_utils::Analyzer;

type OpenIndexes = HashMap<(TableName, IndexName), Arc<LexicalIndex>>;

/// Named lexical indexes laid out as `<root>/<table>/<index>/`.
///
/// Opened indexes are cached so that every caller in the process shares one
/// reader per index and sees commits as soon as they land.
pub struct LexicalCatalog {
	root: PathBuf,
	open: Mutex<OpenIndexes>,
}

impl LexicalCatalog {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into(), open: Mutex::new(HashMap::new()) }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn dir(&self, table: &TableName, index: &IndexName) -> PathBuf {
		self.root.join(table.as_str()).join(index.as_str())
	}

	fn lock(&self) -> Result<MutexGuard<'_, OpenIndexes>> {
		self.open.lock().map_err(|_| Error::query(Stage::LexicalRanking, "lexical catalog lock poisoned"))
	}

	pub fn exists(&self, table: &TableName, index: &IndexName) -> bool {
		self.dir(table, index).join("meta.json").is_file()
	}

	pub fn create(&self, table: &TableName, index: &IndexName, analyzer: Analyzer) -> Result<Arc<LexicalIndex>> {
		if self.exists(table, index) {
			return Err(Error::query(
				Stage::LexicalRanking,
				format!("lexical index '{index}' already exists on table '{table}'"),
			));
		}
		let created = Arc::new(LexicalIndex::create(&self.dir(table, index), analyzer)?);
		self.lock()?.insert((table.clone(), index.clone()), Arc::clone(&created));
		info!(%table, %index, %analyzer, "lexical index created");
		Ok(created)
	}

	/// Returns the named index, failing with `QueryExecution` if it was never created.
	pub fn open(&self, table: &TableName, index: &IndexName) -> Result<Arc<LexicalIndex>> {
		let key = (table.clone(), index.clone());
		if let Some(found) = self.lock()?.get(&key) {
			return Ok(Arc::clone(found));
		}
		if !self.exists(table, index) {
			return Err(Error::query(
				Stage::LexicalRanking,
				format!("lexical index '{index}' does not exist on table '{table}'"),
			));
		}
		let opened = Arc::new(LexicalIndex::open(&self.dir(table, index))?);
		let mut open = self.lock()?;
		Ok(Arc::clone(open.entry(key).or_insert(opened)))
	}

	/// Every lexical index defined on `table`, sorted by name.
	pub fn indexes_for(&self, table: &TableName) -> Result<Vec<(IndexName, Arc<LexicalIndex>)>> {
		let table_dir = self.root.join(table.as_str());
		if !table_dir.is_dir() { return Ok(Vec::new()); }
		let entries = std::fs::read_dir(&table_dir)
			.map_err(|e| Error::query(Stage::Store, format!("cannot list {}: {e}", table_dir.display())))?;
		let mut names: Vec<IndexName> = entries
			.filter_map(|e| e.ok())
			.filter(|e| e.path().join("meta.json").is_file())
			.filter_map(|e| IndexName::new(e.file_name().to_string_lossy().to_string()).ok())
			.collect();
		names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
		names
			.into_iter()
			.map(|name| {
				let idx = self.open(table, &name)?;
				Ok((name, idx))
			})
			.collect()
	}
}
