//! TOML configuration parsing and validation.
//!
//! All tunables live in one config file; `load_config` rejects bad
//! parameters as [`RagError::InvalidConfig`] before any I/O happens.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    /// Name of the vector store collection. One model version per
    /// collection, enforced by the store.
    #[serde(default = "default_collection")]
    pub collection: String,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

fn default_collection() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Chunking parameters. No baked-in defaults: the right size depends on
/// the embedding model's context window, so both values are required.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks, in characters. Must be < chunk_size.
    pub overlap: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// One of: disabled, openai, ollama, local, hash.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name; doubles as the index's model_version tag.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for a result to survive. `None` keeps
    /// everything the store returns.
    #[serde(default)]
    pub min_score: Option<f64>,
    /// Number of results returned to the caller.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Candidate count fetched by the complex strategy before
    /// deduplication and re-ranking.
    #[serde(default = "default_over_fetch_k")]
    pub over_fetch_k: usize,
    /// A chunk surfaced to the same session at least this many times is
    /// demoted below fresh results. 0 disables the policy.
    #[serde(default)]
    pub history_repeat_threshold: usize,
    /// Bound on a single embed+search round trip.
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_score: None,
            k: default_k(),
            over_fetch_k: default_over_fetch_k(),
            history_repeat_threshold: 0,
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_over_fetch_k() -> usize {
    20
}
fn default_retrieval_timeout_secs() -> u64 {
    30
}

/// Generation service endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: None,
            model: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Bounded worker parallelism across documents.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    4
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RagError::InvalidConfig(format!("failed to read config file {}: {}", path.display(), e))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| RagError::InvalidConfig(format!("failed to parse config file: {}", e)))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(RagError::InvalidConfig(
            "chunking.chunk_size must be > 0".to_string(),
        ));
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        return Err(RagError::InvalidConfig(format!(
            "chunking.overlap ({}) must be < chunking.chunk_size ({})",
            config.chunking.overlap, config.chunking.chunk_size
        )));
    }

    if config.retrieval.k == 0 {
        return Err(RagError::InvalidConfig(
            "retrieval.k must be > 0".to_string(),
        ));
    }
    if config.retrieval.over_fetch_k < config.retrieval.k {
        return Err(RagError::InvalidConfig(format!(
            "retrieval.over_fetch_k ({}) must be >= retrieval.k ({})",
            config.retrieval.over_fetch_k, config.retrieval.k
        )));
    }
    if let Some(min_score) = config.retrieval.min_score {
        if !(-1.0..=1.0).contains(&min_score) {
            return Err(RagError::InvalidConfig(
                "retrieval.min_score must be in [-1.0, 1.0]".to_string(),
            ));
        }
    }

    if config.ingest.workers == 0 {
        return Err(RagError::InvalidConfig(
            "ingest.workers must be > 0".to_string(),
        ));
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" | "hash" => {}
        other => {
            return Err(RagError::InvalidConfig(format!(
                "unknown embedding provider: '{}'. Must be disabled, openai, ollama, local, or hash.",
                other
            )))
        }
    }

    if config.embedding.provider == "openai" {
        if config.embedding.model.is_none() {
            return Err(RagError::InvalidConfig(
                "embedding.model must be specified for the openai provider".to_string(),
            ));
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            return Err(RagError::InvalidConfig(
                "embedding.dims must be > 0 for the openai provider".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rag.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "/tmp/rag.sqlite"

[chunking]
chunk_size = 300
overlap = 50
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.chunking.chunk_size, 300);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.collection, "default");
        assert_eq!(config.retrieval.k, 5);
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_overlap_must_be_less_than_chunk_size() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "/tmp/rag.sqlite"

[chunking]
chunk_size = 100
overlap = 100
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "/tmp/rag.sqlite"

[chunking]
chunk_size = 300
overlap = 50

[embedding]
provider = "mystery"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }

    #[test]
    fn test_over_fetch_must_cover_k() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "/tmp/rag.sqlite"

[chunking]
chunk_size = 300
overlap = 50

[retrieval]
k = 10
over_fetch_k = 5
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }
}
