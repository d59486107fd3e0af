//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_EMBEDDING__API_KEY`). The deployment
//! variables `DASHSCOPE_API_KEY` and `BASE_URL` sit between the files and the
//! `APP_*` layer. Settings are resolved once and handed to constructors explicitly.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::chunking::ChunkRecipe;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment
            .merge(Env::raw().only(&["DASHSCOPE_API_KEY"]).map(|_| "embedding.api_key".into()))
            .merge(Env::raw().only(&["BASE_URL"]).map(|_| "embedding.base_url".into()))
            .merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    /// Typed, validated view of the whole configuration.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub chunking: ChunkingSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.store.dim == 0 {
            return Err(Error::InvalidConfig("store.dim must be > 0".into()));
        }
        if self.store.dim != self.embedding.dimensions {
            return Err(Error::InvalidConfig(format!(
                "store.dim ({}) does not match embedding.dimensions ({})",
                self.store.dim, self.embedding.dimensions
            )));
        }
        self.retrieval.validate()?;
        if self.chunking.max_tokens == 0 {
            return Err(Error::InvalidConfig("chunking.max_tokens must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.chunking.overlap_percent) {
            return Err(Error::InvalidConfig("chunking.overlap_percent must be in [0, 1)".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// LanceDB directory; `~` and `$VAR` are expanded.
    pub uri: String,
    /// Embedding dimensionality D shared by every table in this store.
    pub dim: usize,
    /// Where Tantivy lexical indexes live; defaults to `<uri>/_lexical`.
    pub lexical_dir: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { uri: "./data/passagedb".into(), dim: 1024, lexical_dir: None }
    }
}

impl StoreSettings {
    pub fn uri_path(&self) -> PathBuf {
        expand_path(&self.uri)
    }

    pub fn lexical_path(&self) -> PathBuf {
        match &self.lexical_dir {
            Some(dir) => expand_path(dir),
            None => self.uri_path().join("_lexical"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Http,
    Fake,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    /// OpenAI-compatible embeddings endpoint.
    pub endpoint: String,
    /// API root such as `https://host/compatible-mode/v1`; when set, requests
    /// go to `<base_url>/embeddings` instead of `endpoint`.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Http,
            endpoint: "https://dashscope.aliyuncs.com/compatible-mode/v1/embeddings".into(),
            base_url: None,
            api_key: None,
            model: "text-embedding-v4".into(),
            dimensions: 1024,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    /// The URL embedding requests are posted to.
    pub fn embeddings_url(&self) -> String {
        match &self.base_url {
            Some(base) => format!("{}/embeddings", base.trim_end_matches('/')),
            None => self.endpoint.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// RRF smoothing constant k in `1 / (k + rank)`.
    pub rrf_k: f64,
    /// Candidate pool multiplier for hybrid mode.
    pub oversample: usize,
    pub default_top_k: usize,
    /// Budget for a whole search request, embedder call included.
    pub query_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { rrf_k: 60.0, oversample: 2, default_top_k: 10, query_timeout_ms: 30_000 }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.rrf_k.is_finite() && self.rrf_k > 0.0) {
            return Err(Error::InvalidConfig(format!("retrieval.rrf_k must be > 0, got {}", self.rrf_k)));
        }
        if self.oversample == 0 {
            return Err(Error::InvalidConfig("retrieval.oversample must be >= 1".into()));
        }
        if self.default_top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.default_top_k must be >= 1".into()));
        }
        if self.query_timeout_ms == 0 {
            return Err(Error::InvalidConfig("retrieval.query_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub recipe: ChunkRecipe,
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { recipe: ChunkRecipe::Markdown, max_tokens: 512, overlap_percent: 0.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: "info".into() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().expect("defaults validate");
        assert!((settings.retrieval.rrf_k - 60.0).abs() < f64::EPSILON);
        assert_eq!(settings.retrieval.oversample, 2);
        assert_eq!(settings.retrieval.default_top_k, 10);
    }

    #[test]
    fn toml_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [store]
                uri = "/tmp/pdb"
                dim = 8
                [embedding]
                backend = "fake"
                dimensions = 8
                "#,
            )?;
            jail.create_file("config.test.toml", "[retrieval]\nrrf_k = 30.0\n")?;
            jail.set_env("APP_RETRIEVAL__OVERSAMPLE", "3");
            let settings = Config::load_for_env("test").expect("load").settings().expect("settings");
            assert_eq!(settings.store.uri, "/tmp/pdb");
            assert_eq!(settings.store.dim, 8);
            assert_eq!(settings.embedding.backend, EmbeddingBackend::Fake);
            assert!((settings.retrieval.rrf_k - 30.0).abs() < f64::EPSILON);
            assert_eq!(settings.retrieval.oversample, 3);
            assert_eq!(settings.store.lexical_path(), PathBuf::from("/tmp/pdb/_lexical"));
            Ok(())
        });
    }

    #[test]
    fn deployment_variables_fill_embedding_settings() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[embedding]\nmodel = \"text-embedding-v4\"\n")?;
            jail.set_env("DASHSCOPE_API_KEY", "sk-deploy");
            jail.set_env("BASE_URL", "http://10.0.0.5:8000/v1/");
            let settings = Config::load_for_env("test").expect("load").settings().expect("settings");
            assert_eq!(settings.embedding.api_key.as_deref(), Some("sk-deploy"));
            assert_eq!(settings.embedding.embeddings_url(), "http://10.0.0.5:8000/v1/embeddings");

            jail.set_env("APP_EMBEDDING__API_KEY", "sk-app");
            let settings = Config::load_for_env("test").expect("load").settings().expect("settings");
            assert_eq!(settings.embedding.api_key.as_deref(), Some("sk-app"));
            Ok(())
        });
    }

    #[test]
    fn endpoint_used_without_base_url() {
        let settings = EmbeddingSettings::default();
        assert_eq!(settings.embeddings_url(), settings.endpoint);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[store]\ndim = 16\n")?;
            let err = Config::load_for_env("dev").expect("load").settings().unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)), "{err}");
            Ok(())
        });
    }

    #[test]
    fn zero_oversample_is_rejected() {
        let mut r = RetrievalSettings::default();
        r.oversample = 0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn expands_env_vars_in_paths() {
        Jail::expect_with(|jail| {
            jail.set_env("PDB_ROOT", "/data/pdb");
            assert_eq!(expand_path("$PDB_ROOT/lance"), PathBuf::from("/data/pdb/lance"));
            assert_eq!(expand_path("plain/dir"), PathBuf::from("plain/dir"));
            Ok(())
        });
    }
}
