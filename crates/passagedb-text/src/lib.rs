//! passagedb-text
//!
//! Tantivy BM25 lexical indexes. Each `(table, index)` pair owns one index
//! directory under the catalog root; see `catalog` for lookup and `index`
//! for the writer and ranking query.
pub mod catalog;
pub mod index;
pub mod tantivy_utils;

pub use catalog::LexicalCatalog;
pub use index::{LexicalIndex, LexicalWriter};
pub use tantivy_utils::Analyzer;
