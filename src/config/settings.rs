//! Configuration settings for the keyword clustering service.

use crate::clustering::{DetailLevel, ScoreCalibration};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub clustering: ClusteringConfig,
    pub refinement: RefinementConfig,
    pub jobs: JobsConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("kwcluster.toml"),
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .map(|p| p.join("kwcluster/config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".kwcluster/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Apply the environment overrides the service has always honored.
    ///
    /// `EMBEDDING_MODEL`, `SYNC_MAX_KEYWORDS`, `ASYNC_MAX_KEYWORDS` and
    /// `API_KEY`. Unparsable numbers are ignored.
    ///
    /// `HDBSCAN_MIN_CLUSTER_SIZE` is not read; each detail level keeps its
    /// own profile size unless `clustering.min_cluster_size` or the request
    /// overrides it.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            if !model.trim().is_empty() {
                self.embedding.model = model.trim().to_string();
            }
        }
        if let Some(n) = env_usize("SYNC_MAX_KEYWORDS") {
            self.server.sync_max_keywords = n;
        }
        if let Some(n) = env_usize("ASYNC_MAX_KEYWORDS") {
            self.server.async_max_keywords = n;
        }
        if let Ok(key) = std::env::var("API_KEY") {
            if !key.is_empty() {
                self.auth.fallback_key = key;
            }
        }
        self
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::MissingField("embedding.model".to_string()).into());
        }

        if !(-1.0..=1.0).contains(&self.clustering.noise_threshold) {
            return Err(ConfigError::Invalid(
                "clustering.noise_threshold must be within [-1, 1]".to_string(),
            )
            .into());
        }

        let features = &self.clustering.features;
        if features.ngram_min == 0 || features.ngram_min > features.ngram_max {
            return Err(ConfigError::Invalid(
                "clustering.features n-gram range must satisfy 1 <= ngram_min <= ngram_max"
                    .to_string(),
            )
            .into());
        }
        if features.semantic_weight < 0.0 || features.lexical_weight < 0.0 {
            return Err(
                ConfigError::Invalid("feature weights must be non-negative".to_string()).into(),
            );
        }

        if let Some(size) = self.clustering.min_cluster_size {
            if size < 2 {
                return Err(ConfigError::Invalid(
                    "clustering.min_cluster_size must be >= 2".to_string(),
                )
                .into());
            }
        }

        let cal = &self.refinement.calibration;
        if cal.min > cal.max {
            return Err(ConfigError::Invalid(
                "refinement.calibration.min must not exceed max".to_string(),
            )
            .into());
        }

        if self.jobs.max_jobs == 0 {
            return Err(ConfigError::Invalid("jobs.max_jobs must be > 0".to_string()).into());
        }

        if self.server.sync_max_keywords == 0 || self.server.async_max_keywords == 0 {
            return Err(
                ConfigError::Invalid("keyword limits must be > 0".to_string()).into(),
            );
        }

        Ok(())
    }

    /// Expand the API key file path.
    pub fn keys_file(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.auth.keys_file);
        PathBuf::from(expanded.as_ref())
    }

    /// Expand the model cache directory, if configured.
    pub fn model_cache_dir(&self) -> Option<PathBuf> {
        self.embedding
            .cache_dir
            .as_ref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()))
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Maximum keywords accepted by the synchronous endpoint
    pub sync_max_keywords: usize,
    /// Maximum keywords accepted by the asynchronous endpoint
    pub async_max_keywords: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            sync_max_keywords: 5000,
            async_max_keywords: 100_000,
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model name for local embeddings
    pub model: String,
    /// Texts per encoder call
    pub batch_size: usize,
    /// Show model download progress
    pub show_download_progress: bool,
    /// Model cache directory (fastembed default when unset)
    pub cache_dir: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "intfloat/multilingual-e5-base".to_string(),
            batch_size: 256,
            show_download_progress: false,
            cache_dir: None,
        }
    }
}

/// Embedding cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable caching
    pub enabled: bool,
    /// Maximum number of cached vectors
    pub max_entries: u64,
    /// TTL for cached vectors in seconds (0 = no expiry)
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 200_000,
            ttl_secs: 0,
        }
    }
}

/// Clustering pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Detail level used when a request does not name one
    pub default_level: DetailLevel,
    /// Minimum cosine similarity for folding noise into a cluster
    pub noise_threshold: f32,
    /// Minimum cluster size applied when the request has no override
    pub min_cluster_size: Option<usize>,
    /// Inputs smaller than this skip reduction and hybrid features
    pub small_input_threshold: usize,
    /// Seed for the reducer
    pub seed: u64,
    /// Hybrid feature settings
    pub features: FeatureConfig,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            default_level: DetailLevel::Balanced,
            noise_threshold: 0.65,
            min_cluster_size: None,
            small_input_threshold: 10,
            seed: 42,
            features: FeatureConfig::default(),
        }
    }
}

/// Lexical analyzer for hybrid features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Analyzer {
    /// Word n-grams
    Word,
    /// Character n-grams
    Char,
}

/// Hybrid feature configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub analyzer: Analyzer,
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub semantic_weight: f32,
    pub lexical_weight: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            analyzer: Analyzer::Word,
            ngram_min: 1,
            ngram_max: 2,
            semantic_weight: 1.0,
            lexical_weight: 1.0,
        }
    }
}

/// Cross-encoder refinement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Enable the refinement pass
    pub enabled: bool,
    /// Cross-encoder model name
    pub model: String,
    /// Members scoring at or below this are evicted
    pub rejection_threshold: f32,
    /// Pairs per cross-encoder batch
    pub batch_size: usize,
    /// Raw score to matching point mapping
    pub calibration: ScoreCalibration,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "bge-reranker-v2-m3".to_string(),
            rejection_threshold: -2.0,
            batch_size: 32,
            calibration: ScoreCalibration::default(),
        }
    }
}

/// Background job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Jobs processed concurrently
    pub max_jobs: usize,
    /// Wall-clock ceiling per job in seconds
    pub job_timeout_secs: u64,
    /// How long job records are kept, in seconds
    pub keep_result_secs: u64,
    /// Pending jobs the queue accepts before rejecting
    pub queue_capacity: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_jobs: 1,
            job_timeout_secs: 3600,
            keep_result_secs: 3600,
            queue_capacity: 1024,
        }
    }
}

/// API key authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JSON key store path
    pub keys_file: String,
    /// Key accepted when the key store does not exist
    pub fallback_key: String,
    /// Synchronous requests per key per minute
    pub sync_per_minute: u32,
    /// Asynchronous submissions per key per minute
    pub async_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            keys_file: "api_keys.json".to_string(),
            fallback_key: "dev-secret-key".to_string(),
            sync_per_minute: 10,
            async_per_minute: 100,
        }
    }
}
