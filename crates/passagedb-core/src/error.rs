use std::fmt;

use thiserror::Error;

/// The collaborator or phase an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedder,
    Store,
    SemanticRanking,
    LexicalRanking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embedder => "embedder",
            Stage::Store => "store",
            Stage::SemanticRanking => "semantic ranking",
            Stage::LexicalRanking => "lexical ranking",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Store or embedder could not be reached, or did not answer in time.
    #[error("{stage} unreachable: {message}")]
    Connectivity { stage: Stage, message: String },

    /// Rejected before any network or store call.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A passage failed mid-document; the whole document was rolled back.
    #[error("Ingestion of '{document}' failed at passage {passage}/{total}, no rows committed: {source}")]
    PartialIngestion {
        document: String,
        passage: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    /// The store rejected a ranking query or write (unknown table or index, malformed query).
    #[error("{stage} query failed: {message}")]
    QueryExecution { stage: Stage, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn connectivity(stage: Stage, message: impl Into<String>) -> Self {
        Self::Connectivity { stage, message: message.into() }
    }

    pub fn query(stage: Stage, message: impl Into<String>) -> Self {
        Self::QueryExecution { stage, message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stage that produced the error, looking through `PartialIngestion`.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Connectivity { stage, .. } | Self::QueryExecution { stage, .. } => Some(*stage),
            Self::PartialIngestion { source, .. } => source.stage(),
            Self::Validation(_) | Self::InvalidConfig(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
