//! Error types for the keyword clustering service.

use thiserror::Error;

/// Main error type for kwcluster operations.
#[derive(Error, Debug)]
pub enum KwClusterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Clustering error: {0}")]
    Clustering(#[from] ClusteringError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KwClusterError {
    /// Whether this error means the embedding encoder cannot serve requests.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            KwClusterError::Embedding(EmbeddingError::Unavailable(_))
                | KwClusterError::Embedding(EmbeddingError::ModelNotFound(_))
        )
    }
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors caused by caller-supplied keywords or files.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("No keywords provided")]
    Empty,

    #[error("Too many keywords: {count} (max {max})")]
    TooMany { count: usize, max: usize },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("No keyword column found. Detected columns: {columns:?}")]
    MissingKeywordColumn { columns: Vec<String> },

    #[error("Malformed delimited file: {0}")]
    Csv(String),

    #[error("Unknown detail level: {0}")]
    UnknownLevel(String),
}

/// Embedding-related errors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("Encoder error: {0}")]
    Api(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Errors from the reduction, density and refinement stages.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("Reduction failed: {0}")]
    Reduction(String),

    #[error("Density clustering failed: {0}")]
    Density(String),

    #[error("Refinement failed: {0}")]
    Refinement(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

/// API key and request authorization errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Could not validate credentials")]
    InvalidKey,

    #[error("Key file error: {0}")]
    KeyFile(String),

    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Background job errors.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Job exceeded {0}s time limit")]
    Timeout(u64),

    #[error("Job queue is full ({0} pending)")]
    QueueFull(usize),

    #[error("Job queue is closed")]
    QueueClosed,
}

/// Result type alias for kwcluster operations.
pub type Result<T> = std::result::Result<T, KwClusterError>;
