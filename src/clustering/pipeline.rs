//! End-to-end keyword clustering.
//!
//! ```text
//! normalize -> embed (cached) -> intent
//!           -> hybrid features -> reduce -> density -> reassign noise
//!           -> name -> refine -> assemble
//! ```
//!
//! Embedding and intent classification are async; everything after runs on
//! the blocking pool as one CPU-bound step.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CachedEmbedder, EmbeddingCache};
use crate::config::{ClusteringConfig, Config};
use crate::embedding::create_provider;
use crate::error::{ClusteringError, Result};
use crate::intent::IntentClassifier;
use crate::processing::normalize_keyword;

use super::assemble::{assemble_output, build_drafts, NoiseTally};
use super::cross_encoder::LocalCrossEncoder;
use super::density::{DensityClusterer, DensityParams, HdbscanClusterer};
use super::features::HybridFeatures;
use super::reassign::{reassign_noise, seed_noise_clusters};
use super::reduction::{reduce, ReductionParams};
use super::refine::{refine_clusters, RefineSettings, RelevanceScorer};
use super::types::{
    ClusterRequest, ClusteringMethod, ClusteringOutput, DetailLevel, Keyword, Label,
};

/// The clustering service: shared, cheap to clone behind an `Arc`.
pub struct ClusteringPipeline {
    embedder: CachedEmbedder,
    classifier: Arc<IntentClassifier>,
    clusterer: Arc<dyn DensityClusterer>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
    config: ClusteringConfig,
    refine: RefineSettings,
}

impl ClusteringPipeline {
    /// Create a pipeline around an embedder, with HDBSCAN and no refiner.
    pub fn new(embedder: CachedEmbedder, config: &Config) -> Self {
        Self {
            embedder,
            classifier: Arc::new(IntentClassifier::new()),
            clusterer: Arc::new(HdbscanClusterer::new()),
            scorer: None,
            config: config.clustering.clone(),
            refine: RefineSettings {
                rejection_threshold: config.refinement.rejection_threshold,
                calibration: config.refinement.calibration,
            },
        }
    }

    /// Load the configured encoder and, if enabled, the cross-encoder.
    ///
    /// Fails when the encoder cannot be loaded. A cross-encoder that fails
    /// to load only disables refinement.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = create_provider(config)?;
        let embedder = CachedEmbedder::new(provider, EmbeddingCache::new(&config.cache));
        let mut pipeline = Self::new(embedder, config);

        if config.refinement.enabled {
            match LocalCrossEncoder::from_config(&config.refinement, config.model_cache_dir()) {
                Ok(encoder) => pipeline = pipeline.with_scorer(Arc::new(encoder)),
                Err(e) => {
                    tracing::warn!(error = %e, "Cross-encoder unavailable, refinement disabled")
                }
            }
        }

        Ok(pipeline)
    }

    /// Use a relevance scorer for refinement.
    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Replace the density clusterer.
    pub fn with_clusterer(mut self, clusterer: Arc<dyn DensityClusterer>) -> Self {
        self.clusterer = clusterer;
        self
    }

    /// Get the cached embedder.
    pub fn embedder(&self) -> &CachedEmbedder {
        &self.embedder
    }

    /// Whether a cross-encoder is attached.
    pub fn has_refiner(&self) -> bool {
        self.scorer.is_some()
    }

    /// Detail level applied to requests that name none.
    pub fn default_level(&self) -> DetailLevel {
        self.config.default_level
    }

    /// Cluster one batch of keywords.
    pub async fn run(&self, request: ClusterRequest) -> Result<ClusteringOutput> {
        let start = Instant::now();
        let n = request.keywords.len();
        let level = request.level.unwrap_or(self.config.default_level);

        if request.clustering_method == ClusteringMethod::Serp {
            tracing::warn!("SERP clustering is not available, using semantic clustering");
        }

        if n == 0 {
            return Ok(ClusteringOutput::default());
        }

        tracing::info!(
            keywords = n,
            level = %level,
            min_cluster_size = ?request.min_cluster_size,
            "Clustering started"
        );

        let normalized: Vec<String> = request
            .keywords
            .iter()
            .map(|k| normalize_keyword(&k.text))
            .collect();

        let embeddings = self.embedder.embed(&normalized).await?;
        let intents = self
            .classifier
            .classify_batch(&normalized, Some(embeddings.as_slice()), Some(&self.embedder))
            .await;

        let keywords: Vec<Keyword> = request
            .keywords
            .into_iter()
            .zip(normalized)
            .zip(embeddings)
            .zip(intents)
            .enumerate()
            .map(|(index, (((input, normalized), embedding), intent))| Keyword {
                index,
                text: input.text,
                normalized,
                volume: input.volume,
                embedding,
                intent,
                label: None,
            })
            .collect();

        let job = ClusterJob {
            level,
            min_cluster_size: request.min_cluster_size.or(self.config.min_cluster_size),
            config: self.config.clone(),
            refine: self.refine,
            clusterer: self.clusterer.clone(),
            scorer: self.scorer.clone(),
        };

        let output = tokio::task::spawn_blocking(move || job.run(keywords))
            .await
            .map_err(|e| ClusteringError::Task(e.to_string()))??;

        tracing::info!(
            keywords = n,
            clusters = output.summary.total_clusters_found,
            noise = output.summary.noise_keywords_found,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Clustering complete"
        );

        Ok(output)
    }
}

/// The CPU-bound part of a run, moved onto the blocking pool.
struct ClusterJob {
    level: DetailLevel,
    min_cluster_size: Option<usize>,
    config: ClusteringConfig,
    refine: RefineSettings,
    clusterer: Arc<dyn DensityClusterer>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
}

impl ClusterJob {
    fn run(self, mut keywords: Vec<Keyword>) -> Result<ClusteringOutput> {
        let labels = self.labels(&keywords)?;
        for (keyword, label) in keywords.iter_mut().zip(labels) {
            keyword.label = label;
        }

        let mut drafts = build_drafts(&keywords);
        let mut noise = NoiseTally {
            keywords: drafts.noise.len(),
            volume: drafts.noise_volume(&keywords),
        };

        let mut evicted = Vec::new();
        if let Some(scorer) = &self.scorer {
            let outcome = refine_clusters(&mut drafts.clusters, &keywords, scorer.as_ref(), &self.refine);
            noise.keywords += outcome.evicted.len();
            noise.volume += outcome.evicted_volume(&keywords);
            evicted = outcome.evicted;
        }

        let mut all = drafts.clusters;
        all.extend(drafts.noise);
        all.extend(evicted);

        Ok(assemble_output(all, &keywords, noise))
    }

    /// Density labels after noise reassignment.
    fn labels(&self, keywords: &[Keyword]) -> Result<Vec<Label>> {
        let n = keywords.len();
        let profile = self.level.profile();
        let embeddings: Vec<Vec<f32>> = keywords.iter().map(|k| k.embedding.clone()).collect();

        let points: Vec<Vec<f64>> = if n < self.config.small_input_threshold.max(3) {
            tracing::info!(keywords = n, "Small input, clustering embeddings directly");
            embeddings
                .iter()
                .map(|e| e.iter().map(|&v| v as f64).collect())
                .collect()
        } else {
            let texts: Vec<String> = keywords.iter().map(|k| k.text.clone()).collect();
            let features = HybridFeatures::build(&embeddings, &texts, &self.config.features);
            let requested =
                ReductionParams::new(profile.n_neighbors, profile.n_components, self.config.seed);
            let params = requested.clone().clamped(n);
            if params.n_neighbors != requested.n_neighbors
                || params.n_components != requested.n_components
            {
                tracing::info!(
                    keywords = n,
                    n_neighbors = params.n_neighbors,
                    n_components = params.n_components,
                    "Reduction parameters adjusted for input size"
                );
            }
            reduce(&features, &params)?
        };

        let density = DensityParams::resolve(
            &profile,
            self.min_cluster_size,
            n,
            self.config.small_input_threshold,
        );
        let mut labels = self.clusterer.cluster(&points, &density)?;
        if labels.len() != n {
            return Err(ClusteringError::Density(format!(
                "{} returned {} labels for {} points",
                self.clusterer.name(),
                labels.len(),
                n
            ))
            .into());
        }

        if n < self.config.small_input_threshold {
            seed_noise_clusters(&mut labels, &embeddings, self.config.noise_threshold);
        }
        reassign_noise(&mut labels, &embeddings, self.config.noise_threshold);
        Ok(labels)
    }
}
