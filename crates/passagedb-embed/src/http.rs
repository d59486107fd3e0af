//! HTTP embedder for OpenAI-compatible `/embeddings` APIs
//!
//! Works with OpenAI, DashScope compatible-mode, and local servers exposing
//! the same request/response shape (vLLM, text-embeddings-inference, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use passagedb_core::config::EmbeddingSettings;
use passagedb_core::error::{Error, Result, Stage};
use passagedb_core::traits::Embedder;

/// DashScope rejects batches larger than 10 inputs.
const MAX_BATCH: usize = 10;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug)]
pub struct HttpEmbedder {
    client: Client,
    settings: EmbeddingSettings,
    url: String,
    name: String,
}

impl HttpEmbedder {
    pub fn new(settings: EmbeddingSettings) -> Result<Self> {
        let url = settings.embeddings_url();
        info!(endpoint = %url, model = %settings.model, "initializing HTTP embedder");

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        match &api_key {
            Some(key) => {
                let value = HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| Error::InvalidConfig(format!("invalid embedding API key: {e}")))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => warn!(endpoint = %url, "no embedding API key configured"),
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        let name = format!("http:{}", settings.model);
        Ok(Self { client, settings, url, name })
    }

    fn request_dimensions(&self) -> Option<usize> {
        let m = self.settings.model.as_str();
        let configurable = m.contains("text-embedding-3") || m.contains("text-embedding-v3") || m.contains("text-embedding-v4");
        configurable.then_some(self.settings.dimensions)
    }

    async fn request_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.settings.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions(),
            encoding_format: "float",
        };
        debug!(endpoint = %self.url, n = texts.len(), "sending embedding request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::connectivity(Stage::Embedder, e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            return Err(Error::connectivity(Stage::Embedder, format!("rate limited, retry after {retry_after}s")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            let message = format!("HTTP {status}: {message}");
            return Err(if status.is_server_error() {
                Error::connectivity(Stage::Embedder, message)
            } else {
                Error::query(Stage::Embedder, message)
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::query(Stage::Embedder, format!("malformed embedding response: {e}")))?;
        if let Some(usage) = &parsed.usage {
            debug!(tokens = usage.total_tokens, "embedding request usage");
        }
        if parsed.data.len() != texts.len() {
            return Err(Error::query(
                Stage::Embedder,
                format!("expected {} embeddings, got {}", texts.len(), parsed.data.len()),
            ));
        }

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        data.into_iter()
            .map(|d| {
                if d.embedding.len() == self.settings.dimensions {
                    Ok(d.embedding)
                } else {
                    Err(Error::validation(format!(
                        "embedder returned dimension {}, expected {}",
                        d.embedding.len(),
                        self.settings.dimensions
                    )))
                }
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dim(&self) -> usize { self.settings.dimensions }

    fn name(&self) -> &str { &self.name }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request_embeddings(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::query(Stage::Embedder, "no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            out.extend(self.request_embeddings(&refs).await?);
        }
        Ok(out)
    }
}
