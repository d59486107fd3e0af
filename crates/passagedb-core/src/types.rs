//! Domain types shared by ingestion, the stores and the retrieval engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Store-assigned, immutable identifier of a persisted passage.
pub type RecordId = i64;

/// A named unit of input text.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub raw_text: String,
}

/// A contiguous span of a document produced by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub text: String,
    pub source_document_name: String,
}

/// The persisted unit.
///
/// `id` is assigned by the store on commit and is the join key used by
/// fusion. `embedding` has the table's fixed dimensionality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub article_name: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// One row returned by a native ranking query, in the store's order.
///
/// `score` is a distance for vector ranking (lower is better) and a
/// relevance for term ranking (higher is better).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHit {
    pub id: RecordId,
    pub content: String,
    pub score: f32,
}

/// Which ranking query produced a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    Lexical,
    Semantic,
}

/// A candidate from a single ranking query; `rank` is 1-based within that list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: RecordId,
    pub content: String,
    pub rank: usize,
    pub raw_score: f32,
    pub source: RetrievalSource,
}

/// Output of rank fusion, ordered by `combined_score` descending then `id`.
///
/// The per-source ranks record where each contribution came from; `None`
/// means the record was absent from that list and contributed 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub id: RecordId,
    pub content: String,
    pub combined_score: f64,
    pub semantic_rank: Option<usize>,
    pub lexical_rank: Option<usize>,
}

/// Retrieval strategy requested by the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Lexical,
    Semantic,
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" | "lexical" => Ok(SearchMode::Lexical),
            "vector" | "semantic" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(Error::validation(format!(
                "unsupported search mode '{other}' (expected keyword, vector or hybrid)"
            ))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchMode::Lexical => "keyword",
            SearchMode::Semantic => "vector",
            SearchMode::Hybrid => "hybrid",
        })
    }
}
