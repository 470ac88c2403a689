//! Embedding trait definitions.

use async_trait::async_trait;

/// Trait for dense text encoders.
///
/// Implementations return one vector per input text, in input order. Task
/// prefixes are applied by the caller (see [`crate::cache::CachedEmbedder`]);
/// an encoder only reports which prefix its model expects.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for text.
    async fn embed(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>>;

    /// Return the embedding dimension.
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model.
    fn model_id(&self) -> &str;

    /// Prefix the model expects in front of every input.
    fn text_prefix(&self) -> &str {
        ""
    }

    /// Return the maximum batch size.
    fn max_batch_size(&self) -> usize {
        100
    }
}
