use std::fmt::Display;
use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, warn};

use passagedb_core::error::{Error, Result, Stage};
use passagedb_core::types::{RecordId, StoreHit};

use crate::tantivy_utils::{build_schema, register_tokenizers, Analyzer, LexicalFields};

const WRITER_MEMORY_BUDGET: usize = 50_000_000;

fn lexical_err(e: impl Display) -> Error {
	Error::query(Stage::LexicalRanking, e.to_string())
}

/// One on-disk BM25 index over the `content` of a table's passages.
pub struct LexicalIndex {
	index: Index,
	reader: IndexReader,
	fields: LexicalFields,
}

impl LexicalIndex {
	/// Creates a new index in `dir`, which must not already hold one.
	pub fn create(dir: &Path, analyzer: Analyzer) -> Result<Self> {
		std::fs::create_dir_all(dir).map_err(lexical_err)?;
		let index = Index::create_in_dir(dir, build_schema(analyzer)).map_err(lexical_err)?;
		debug!(dir = %dir.display(), %analyzer, "created lexical index");
		Self::from_index(index)
	}

	pub fn open(dir: &Path) -> Result<Self> {
		let index = Index::open_in_dir(dir).map_err(lexical_err)?;
		Self::from_index(index)
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizers(&index).map_err(lexical_err)?;
		let fields = LexicalFields::from_schema(&index.schema()).map_err(lexical_err)?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(lexical_err)?;
		Ok(Self { index, reader, fields })
	}

	/// Opens the single writer for this index. Tantivy holds a directory lock
	/// until the writer is committed, rolled back or dropped.
	pub fn writer(&self) -> Result<LexicalWriter> {
		let writer = self.index.writer(WRITER_MEMORY_BUDGET).map_err(lexical_err)?;
		Ok(LexicalWriter { writer, reader: self.reader.clone(), fields: self.fields, pending: 0 })
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}

	/// BM25 ranking over `content`, highest relevance first.
	///
	/// The query is plain text run through the field's analyzer, so it has no
	/// syntax of its own; any term may match. A query whose terms are all stop
	/// words matches nothing.
	pub fn search(&self, query_text: &str, limit: usize) -> Result<Vec<StoreHit>> {
		if limit == 0 { return Ok(Vec::new()); }
		let terms = self.query_terms(query_text)?;
		if terms.is_empty() {
			debug!(query = query_text, "no searchable terms in lexical query");
			return Ok(Vec::new());
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.into_iter()
			.map(|term| -> (Occur, Box<dyn Query>) { (Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))) })
			.collect();
		let query = BooleanQuery::new(clauses);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(limit)).map_err(lexical_err)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, address) in top_docs {
			let doc: TantivyDocument = searcher.doc(address).map_err(lexical_err)?;
			let Some(id) = doc.get_first(self.fields.id).and_then(|v| v.as_i64()) else {
				warn!(?address, "lexical hit without id, skipping");
				continue;
			};
			let content = doc.get_first(self.fields.content).and_then(|v| v.as_str()).unwrap_or_default().to_string();
			hits.push(StoreHit { id, content, score });
		}
		debug!(query = query_text, hits = hits.len(), "lexical search");
		Ok(hits)
	}

	/// Distinct `content` terms of `query_text`, in first-seen order.
	fn query_terms(&self, query_text: &str) -> Result<Vec<Term>> {
		let mut analyzer = self.index.tokenizer_for_field(self.fields.content).map_err(lexical_err)?;
		let mut stream = analyzer.token_stream(query_text);
		let mut terms: Vec<Term> = Vec::new();
		while stream.advance() {
			let term = Term::from_field_text(self.fields.content, &stream.token().text);
			if !terms.contains(&term) {
				terms.push(term);
			}
		}
		Ok(terms)
	}
}

/// Pending additions to a [`LexicalIndex`]; invisible to searches until `commit`.
pub struct LexicalWriter {
	writer: IndexWriter,
	reader: IndexReader,
	fields: LexicalFields,
	pending: usize,
}

impl LexicalWriter {
	pub fn add(&mut self, id: RecordId, article_name: &str, content: &str) -> Result<()> {
		let f = self.fields;
		self.writer
			.add_document(doc!(f.id => id, f.article_name => article_name, f.content => content))
			.map_err(lexical_err)?;
		self.pending += 1;
		Ok(())
	}

	/// Queues deletion of every document whose id is in `ids`.
	pub fn delete_ids(&mut self, ids: &[RecordId]) {
		for id in ids {
			self.writer.delete_term(Term::from_field_i64(self.fields.id, *id));
		}
	}

	pub fn pending(&self) -> usize {
		self.pending
	}

	pub fn commit(mut self) -> Result<()> {
		self.writer.commit().map_err(lexical_err)?;
		self.reader.reload().map_err(lexical_err)?;
		Ok(())
	}

	pub fn rollback(mut self) -> Result<()> {
		self.writer.rollback().map_err(lexical_err)?;
		Ok(())
	}
}
