//! passagedb-embed
//!
//! Embedder implementations: an OpenAI-compatible HTTP client and a
//! deterministic fake for tests. `get_default_embedder` picks one from
//! settings; `APP_USE_FAKE_EMBEDDINGS=1` forces the fake.

pub mod fake;
pub mod http;

use std::sync::Arc;

use tracing::info;

use passagedb_core::config::{EmbeddingBackend, EmbeddingSettings};
use passagedb_core::error::Result;
use passagedb_core::traits::Embedder;

pub use fake::FakeEmbedder;
pub use http::HttpEmbedder;

fn fake_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if fake_forced() || settings.backend == EmbeddingBackend::Fake {
        info!(dim = settings.dimensions, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.dimensions)));
    }
    Ok(Arc::new(HttpEmbedder::new(settings.clone())?))
}
