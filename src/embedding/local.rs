//! Local embedding provider using fastembed-rs.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};

use super::{l2_normalize, EmbeddingProvider};

/// Local embedding provider using fastembed-rs with ONNX models.
pub struct LocalEmbeddingProvider {
    text_model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    prefix: &'static str,
    dimension: usize,
    max_batch_size: usize,
}

impl LocalEmbeddingProvider {
    /// Create a new local embedding provider with the specified model.
    pub fn new(model_name: &str) -> Result<Self> {
        Self::with_options(model_name, 256, false, None)
    }

    /// Create a provider from configuration.
    pub fn from_config(config: &EmbeddingConfig, cache_dir: Option<PathBuf>) -> Result<Self> {
        Self::with_options(
            &config.model,
            config.batch_size,
            config.show_download_progress,
            cache_dir,
        )
    }

    fn with_options(
        model_name: &str,
        batch_size: usize,
        show_download_progress: bool,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let model = Self::parse_model_name(model_name)?;

        let mut options = InitOptions::new(model).with_show_download_progress(show_download_progress);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let text_model = TextEmbedding::try_new(options).map_err(|e| {
            EmbeddingError::Unavailable(format!("failed to load {}: {}", model_name, e))
        })?;

        tracing::info!(model = model_name, "Embedding model loaded");

        Ok(Self {
            text_model: Arc::new(Mutex::new(text_model)),
            model_name: model_name.to_string(),
            prefix: Self::model_prefix(model_name),
            dimension: Self::get_model_dimension(model_name),
            max_batch_size: batch_size.max(1),
        })
    }

    fn parse_model_name(model_name: &str) -> Result<EmbeddingModel> {
        match model_name {
            "intfloat/multilingual-e5-small" | "multilingual-e5-small" => {
                Ok(EmbeddingModel::MultilingualE5Small)
            }
            "intfloat/multilingual-e5-base" | "multilingual-e5-base" => {
                Ok(EmbeddingModel::MultilingualE5Base)
            }
            "intfloat/multilingual-e5-large" | "multilingual-e5-large" => {
                Ok(EmbeddingModel::MultilingualE5Large)
            }
            "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2"
            | "paraphrase-multilingual-MiniLM-L12-v2" => {
                Ok(EmbeddingModel::ParaphraseMLMiniLML12V2)
            }
            "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => {
                Ok(EmbeddingModel::AllMiniLML6V2)
            }
            _ => Err(EmbeddingError::ModelNotFound(format!(
                "Unknown model: {}. Supported: multilingual-e5-small/base/large, \
                paraphrase-multilingual-MiniLM-L12-v2, bge-small-en-v1.5, all-MiniLM-L6-v2",
                model_name
            ))
            .into()),
        }
    }

    fn get_model_dimension(model_name: &str) -> usize {
        match model_name {
            s if s.contains("multilingual-e5-small") => 384,
            s if s.contains("multilingual-e5-base") => 768,
            s if s.contains("multilingual-e5-large") => 1024,
            s if s.contains("MiniLM-L12") => 384,
            s if s.contains("bge-small") => 384,
            s if s.contains("MiniLM-L6") => 384,
            _ => 384,
        }
    }

    /// E5 and instruct models are trained with a task prefix.
    fn model_prefix(model_name: &str) -> &'static str {
        let lowered = model_name.to_lowercase();
        if lowered.contains("e5") || lowered.contains("instruct") {
            "query: "
        } else {
            ""
        }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let texts = texts.to_vec();
        let model = self.text_model.clone();
        let batch_size = self.max_batch_size;

        // fastembed is synchronous
        let mut embeddings = tokio::task::spawn_blocking(move || {
            let model = model.blocking_lock();
            model.embed(texts, Some(batch_size))
        })
        .await
        .map_err(|e| EmbeddingError::Api(format!("Task join error: {}", e)))?
        .map_err(|e| EmbeddingError::Api(format!("Embedding failed: {}", e)))?;

        for vector in &mut embeddings {
            if vector.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    got: vector.len(),
                }
                .into());
            }
            l2_normalize(vector);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }

    fn text_prefix(&self) -> &str {
        self.prefix
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}
