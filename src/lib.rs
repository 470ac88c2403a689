//! kwcluster: keyword topic clustering.
//!
//! Groups search keywords into named topics using sentence embeddings,
//! density clustering over a reduced hybrid feature space, and optional
//! cross-encoder refinement. Served over HTTP with a background job queue,
//! or run from the command line against a CSV export.

pub mod api;
pub mod auth;
pub mod cache;
pub mod clustering;
pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod intent;
pub mod jobs;
pub mod processing;

pub use api::{create_router, run_server, ApiState};
pub use auth::{ApiKeyEntry, AuthLayer, Authenticator, ClientIdentity, KeyStore, KeySummary};
pub use cache::{CachedEmbedder, EmbeddingCache};
pub use clustering::{
    ClusterRequest, ClusterSummary, ClusteringMethod, ClusteringOutput, ClusteringPipeline,
    DetailLevel, KeywordInput, KeywordOutput, RelevanceScorer, TopicCluster,
};
pub use config::Config;
pub use embedding::EmbeddingProvider;
pub use error::{KwClusterError, Result};
pub use intent::{Intent, IntentClassifier, IntentLabel, SubIntent};
pub use jobs::{JobQueue, JobRecord, JobRunner, JobStatus, JobStore};
pub use processing::{load_keywords_from_file, normalize_keyword, parse_volume};
