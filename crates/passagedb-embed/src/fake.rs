use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use passagedb_core::error::Result;
use passagedb_core::traits::Embedder;

/// Deterministic bag-of-words hashing embedder for tests and offline runs.
///
/// Texts sharing lowercase words land close in cosine space, which is enough
/// for semantic ranking to behave sensibly without a model.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dim: usize,
    name: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, name: format!("fake:d{dim}") }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);
        for (i, token) in words.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn name(&self) -> &str { &self.name }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}
