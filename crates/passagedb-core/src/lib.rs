//! passagedb-core
//!
//! Domain types, the error taxonomy, collaborator traits (chunker, embedder,
//! passage store), identifier validation and configuration shared by every
//! other crate in the workspace.

pub mod chunking;
pub mod config;
pub mod error;
pub mod ident;
pub mod traits;
pub mod types;

pub use error::{Error, Result, Stage};
pub use ident::{IndexName, TableName};
