//! Cross-encoder relevance scoring with local ONNX models.
//!
//! A cross-encoder reads the cluster name and a member keyword as one pair
//! and returns a raw relevance logit. The refiner uses these logits to evict
//! members that the bi-encoder grouped by mistake.
//!
//! # Supported Models
//!
//! - `BgeRerankerV2M3`: multilingual, the default
//! - `BgeRerankerBase`: BAAI/bge-reranker-base
//! - `JinaRerankerV1TurboEn`: fast English reranking
//! - `JinaRerankerV2BaseMultilingual`: jinaai/jina-reranker-v2-base-multilingual

use std::path::PathBuf;

use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::RefinementConfig;
use crate::error::{ClusteringError, EmbeddingError, Result};

use super::refine::RelevanceScorer;

/// Cross-encoder model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrossEncoderModel {
    /// rozgo/bge-reranker-v2-m3 - Multilingual support
    #[default]
    BgeRerankerV2M3,
    /// BAAI/bge-reranker-base - General purpose
    BgeRerankerBase,
    /// jinaai/jina-reranker-v1-turbo-en - Fast English reranking
    JinaRerankerV1TurboEn,
    /// jinaai/jina-reranker-v2-base-multilingual - Multilingual
    JinaRerankerV2BaseMultilingual,
}

impl CrossEncoderModel {
    /// Convert to fastembed RerankerModel.
    pub fn to_fastembed_model(&self) -> RerankerModel {
        match self {
            CrossEncoderModel::BgeRerankerV2M3 => RerankerModel::BGERerankerV2M3,
            CrossEncoderModel::BgeRerankerBase => RerankerModel::BGERerankerBase,
            CrossEncoderModel::JinaRerankerV1TurboEn => RerankerModel::JINARerankerV1TurboEn,
            CrossEncoderModel::JinaRerankerV2BaseMultilingual => {
                RerankerModel::JINARerankerV2BaseMultiligual
            }
        }
    }

    /// Get human-readable model name.
    pub fn display_name(&self) -> &'static str {
        match self {
            CrossEncoderModel::BgeRerankerV2M3 => "rozgo/bge-reranker-v2-m3",
            CrossEncoderModel::BgeRerankerBase => "BAAI/bge-reranker-base",
            CrossEncoderModel::JinaRerankerV1TurboEn => "jinaai/jina-reranker-v1-turbo-en",
            CrossEncoderModel::JinaRerankerV2BaseMultilingual => {
                "jinaai/jina-reranker-v2-base-multilingual"
            }
        }
    }

    /// Parse model name from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bge-reranker-v2-m3" | "rozgo/bge-reranker-v2-m3" | "bge_reranker_v2_m3" => {
                Some(CrossEncoderModel::BgeRerankerV2M3)
            }
            "bge-reranker-base" | "baai/bge-reranker-base" | "bge_reranker_base" => {
                Some(CrossEncoderModel::BgeRerankerBase)
            }
            "jina-reranker-v1-turbo-en"
            | "jinaai/jina-reranker-v1-turbo-en"
            | "jina_reranker_v1_turbo_en" => Some(CrossEncoderModel::JinaRerankerV1TurboEn),
            "jina-reranker-v2-base-multilingual"
            | "jinaai/jina-reranker-v2-base-multilingual"
            | "jina_reranker_v2_base_multilingual" => {
                Some(CrossEncoderModel::JinaRerankerV2BaseMultilingual)
            }
            _ => None,
        }
    }
}

/// Local cross-encoder backed by fastembed.
pub struct LocalCrossEncoder {
    model: Mutex<TextRerank>,
    kind: CrossEncoderModel,
    batch_size: Option<usize>,
}

impl LocalCrossEncoder {
    /// Load a model, downloading it if not cached locally.
    pub fn new(
        kind: CrossEncoderModel,
        batch_size: Option<usize>,
        cache_dir: Option<PathBuf>,
        show_download_progress: bool,
    ) -> Result<Self> {
        tracing::info!("Initializing cross-encoder with model: {}", kind.display_name());

        let mut options = RerankInitOptions::new(kind.to_fastembed_model())
            .with_show_download_progress(show_download_progress);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let model = TextRerank::try_new(options).map_err(|e| {
            EmbeddingError::Unavailable(format!("failed to load cross-encoder: {}", e))
        })?;

        tracing::info!("Cross-encoder initialized successfully");

        Ok(Self {
            model: Mutex::new(model),
            kind,
            batch_size,
        })
    }

    /// Load the model named in the refinement configuration.
    pub fn from_config(config: &RefinementConfig, cache_dir: Option<PathBuf>) -> Result<Self> {
        let kind = CrossEncoderModel::parse(&config.model).ok_or_else(|| {
            EmbeddingError::ModelNotFound(format!(
                "Unknown cross-encoder model: {}. Supported: bge-reranker-v2-m3, \
                 bge-reranker-base, jina-reranker-v1-turbo-en, jina-reranker-v2-base-multilingual",
                config.model
            ))
        })?;
        Self::new(kind, Some(config.batch_size.max(1)), cache_dir, false)
    }

    /// Get the model name.
    pub fn model_name(&self) -> &'static str {
        self.kind.display_name()
    }
}

impl RelevanceScorer for LocalCrossEncoder {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        let docs: Vec<&str> = documents.iter().map(|d| d.as_str()).collect();

        let model = self.model.lock();
        let results = model
            .rerank(query, docs, false, self.batch_size)
            .map_err(|e| ClusteringError::Refinement(format!("Reranking failed: {}", e)))?;

        // Results come back sorted by score; restore input order.
        let mut scores = vec![0.0f32; documents.len()];
        for result in results {
            if result.index < scores.len() {
                scores[result.index] = result.score;
            }
        }

        Ok(scores)
    }

    fn name(&self) -> &str {
        self.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_encoder_model_from_str() {
        assert_eq!(
            CrossEncoderModel::parse("bge-reranker-v2-m3"),
            Some(CrossEncoderModel::BgeRerankerV2M3)
        );
        assert_eq!(
            CrossEncoderModel::parse("BAAI/bge-reranker-base"),
            Some(CrossEncoderModel::BgeRerankerBase)
        );
        assert_eq!(
            CrossEncoderModel::parse("jina_reranker_v1_turbo_en"),
            Some(CrossEncoderModel::JinaRerankerV1TurboEn)
        );
        assert_eq!(CrossEncoderModel::parse("ms-marco-MiniLM-L-6-v2"), None);
    }

    #[test]
    fn test_default_model_is_multilingual() {
        assert_eq!(CrossEncoderModel::default(), CrossEncoderModel::BgeRerankerV2M3);
        assert_eq!(
            CrossEncoderModel::default().display_name(),
            "rozgo/bge-reranker-v2-m3"
        );
    }

    #[test]
    fn test_unknown_model_in_config() {
        let config = RefinementConfig {
            model: "nope".to_string(),
            ..Default::default()
        };
        let err = LocalCrossEncoder::from_config(&config, None).err().unwrap();
        assert!(err.is_unavailable());
    }

    // Integration test - requires model download
    #[test]
    #[ignore = "requires model download"]
    fn test_local_cross_encoder_scoring() {
        let encoder =
            LocalCrossEncoder::new(CrossEncoderModel::BgeRerankerV2M3, Some(2), None, false)
                .unwrap();

        let documents = vec![
            "giá vàng hôm nay".to_string(),
            "thời tiết hà nội".to_string(),
            "giá vàng sjc".to_string(),
        ];
        let scores = encoder.score("giá vàng", &documents).unwrap();

        assert_eq!(scores.len(), 3);
        assert!(scores[0] > scores[1]);
        assert!(scores[2] > scores[1]);
    }
}
