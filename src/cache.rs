//! Embedding cache for the keyword clustering service.
//!
//! Vectors are cached by model id and prefixed text so sequential jobs in
//! the same process reuse earlier work. The cache is bounded by entry
//! count (moka's TinyLFU admission with LRU eviction) and optionally by TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, Result};

/// Hash key for embedding cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmbeddingKey {
    /// Prefixed text as sent to the encoder.
    text: String,
    /// Model identifier.
    model: String,
}

impl EmbeddingKey {
    /// Create a new embedding key.
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
        }
    }
}

/// Bounded, internally synchronized vector cache.
#[derive(Clone)]
pub struct EmbeddingCache {
    entries: Cache<EmbeddingKey, Arc<Vec<f32>>>,
    enabled: bool,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl EmbeddingCache {
    /// Create a new cache from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_entries);
        if config.ttl_secs > 0 {
            builder = builder.time_to_live(Duration::from_secs(config.ttl_secs));
        }

        Self {
            entries: builder.build(),
            enabled: config.enabled && config.max_entries > 0,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a disabled cache.
    pub fn disabled() -> Self {
        Self {
            entries: Cache::builder().max_capacity(0).build(),
            enabled: false,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Check if caching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get a cached embedding.
    pub async fn get(&self, key: &EmbeddingKey) -> Option<Arc<Vec<f32>>> {
        if !self.enabled {
            return None;
        }

        let result = self.entries.get(key).await;
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Store an embedding in the cache.
    pub async fn insert(&self, key: EmbeddingKey, embedding: Vec<f32>) {
        if !self.enabled {
            return;
        }
        self.entries.insert(key, Arc::new(embedding)).await;
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached vectors.
    pub entries: u64,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that went to the encoder.
    pub misses: u64,
}

/// Encoder plus cache: the embedding entry point used by the pipeline.
///
/// Applies the model's task prefix, serves hits from the cache, sends all
/// misses to the encoder in one call and returns vectors in input order.
#[derive(Clone)]
pub struct CachedEmbedder {
    embedder: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
}

impl CachedEmbedder {
    /// Create a new cached embedder.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, cache: EmbeddingCache) -> Self {
        Self { embedder, cache }
    }

    /// Get the underlying embedder.
    pub fn inner(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Get the cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Embedding dimension of the underlying encoder.
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Embed texts with caching.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let prefix = self.embedder.text_prefix();
        let model = self.embedder.model_id().to_string();
        let prefixed: Vec<String> = texts.iter().map(|t| format!("{}{}", prefix, t)).collect();

        if !self.cache.is_enabled() {
            return self.checked_embed(&prefixed).await;
        }

        let mut results: Vec<Option<Vec<f32>>> = vec![None; prefixed.len()];
        let mut to_embed: Vec<(usize, String)> = Vec::new();

        for (i, text) in prefixed.iter().enumerate() {
            let key = EmbeddingKey::new(text.clone(), model.clone());
            if let Some(cached) = self.cache.get(&key).await {
                results[i] = Some((*cached).clone());
            } else {
                to_embed.push((i, text.clone()));
            }
        }

        if !to_embed.is_empty() {
            let texts_to_embed: Vec<String> = to_embed.iter().map(|(_, t)| t.clone()).collect();
            let embeddings = self.checked_embed(&texts_to_embed).await?;

            for ((idx, text), embedding) in to_embed.into_iter().zip(embeddings.into_iter()) {
                let key = EmbeddingKey::new(text, model.clone());
                self.cache.insert(key, embedding.clone()).await;
                results[idx] = Some(embedding);
            }
        }

        tracing::debug!(
            requested = texts.len(),
            cache = ?self.cache.stats(),
            "Embedded keyword batch"
        );

        Ok(results.into_iter().flatten().collect())
    }

    async fn checked_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.embedder.embed(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::Api(format!(
                "encoder returned {} vectors for {} texts",
                embeddings.len(),
                texts.len()
            ))
            .into());
        }
        Ok(embeddings)
    }
}
