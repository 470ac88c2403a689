//! Embedding module for dense keyword vectors.
//!
//! [`LocalEmbeddingProvider`] wraps a fastembed ONNX model. Everything
//! downstream talks to the [`EmbeddingProvider`] trait, so tests and other
//! encoders can be injected into the pipeline.
//!
//! Vectors leaving a provider are L2-normalized.

mod local;
mod traits;

pub use local::LocalEmbeddingProvider;
pub use traits::EmbeddingProvider;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;

/// Create the configured embedding provider.
///
/// Fails fast when the model cannot be loaded; the service never runs
/// without an encoder.
pub fn create_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = LocalEmbeddingProvider::from_config(&config.embedding, config.model_cache_dir())?;
    Ok(Arc::new(provider))
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
