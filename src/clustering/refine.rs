//! Cross-encoder refinement of assembled clusters.
//!
//! Every member whose text differs from the cluster name is scored against
//! the name. Members scoring at or below the rejection threshold are evicted
//! into singleton clusters; the rest get their matching point replaced by the
//! calibrated cross-encoder score. Refinement never changes which keywords
//! appear in the output, only where they sit.

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::assemble::DraftCluster;
use super::similarity::round1;
use super::types::Keyword;

/// Scores `(query, document)` pairs for relevance.
///
/// Returns one raw score per document, in input order. Higher is more
/// relevant; the scale is model specific.
pub trait RelevanceScorer: Send + Sync {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;

    /// Get the name of this scorer.
    fn name(&self) -> &str;
}

/// Linear map from raw cross-encoder score to matching point.
///
/// `clamp((score + offset) * scale, min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreCalibration {
    pub offset: f32,
    pub scale: f32,
    pub min: f32,
    pub max: f32,
}

impl Default for ScoreCalibration {
    fn default() -> Self {
        Self {
            offset: 4.0,
            scale: 10.0,
            min: 10.0,
            max: 100.0,
        }
    }
}

impl ScoreCalibration {
    /// Matching point for a raw score, rounded to one decimal.
    pub fn apply(&self, score: f32) -> f64 {
        let mapped = ((score + self.offset) * self.scale).clamp(self.min, self.max);
        round1(mapped as f64)
    }
}

/// Refinement settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineSettings {
    /// Scores at or below this evict the member.
    pub rejection_threshold: f32,
    pub calibration: ScoreCalibration,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            rejection_threshold: -2.0,
            calibration: ScoreCalibration::default(),
        }
    }
}

/// What refinement changed.
#[derive(Debug, Default)]
pub struct RefineOutcome {
    /// One singleton per evicted keyword, in eviction order.
    pub evicted: Vec<DraftCluster>,
    /// Clusters skipped because scoring failed.
    pub failed_clusters: usize,
}

impl RefineOutcome {
    pub fn evicted_volume(&self, keywords: &[Keyword]) -> u64 {
        self.evicted
            .iter()
            .flat_map(|c| c.members.iter())
            .map(|m| keywords[m.index].volume)
            .sum()
    }
}

/// Refine clusters in place.
///
/// Singletons are left alone. A scoring failure on one cluster is logged
/// and leaves that cluster untouched.
pub fn refine_clusters(
    clusters: &mut [DraftCluster],
    keywords: &[Keyword],
    scorer: &dyn RelevanceScorer,
    settings: &RefineSettings,
) -> RefineOutcome {
    let mut outcome = RefineOutcome::default();

    for cluster in clusters.iter_mut() {
        if cluster.members.len() < 2 {
            continue;
        }

        let candidates: Vec<usize> = cluster
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| keywords[m.index].text != cluster.name)
            .map(|(pos, _)| pos)
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let documents: Vec<String> = candidates
            .iter()
            .map(|&pos| keywords[cluster.members[pos].index].text.clone())
            .collect();

        let scores = match scorer.score(&cluster.name, &documents) {
            Ok(scores) if scores.len() == documents.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    cluster = %cluster.name,
                    expected = documents.len(),
                    got = scores.len(),
                    "Scorer returned wrong number of scores, skipping cluster"
                );
                outcome.failed_clusters += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(cluster = %cluster.name, error = %e, "Refinement failed, skipping cluster");
                outcome.failed_clusters += 1;
                continue;
            }
        };

        let mut rejected = vec![false; cluster.members.len()];
        for (&pos, &score) in candidates.iter().zip(scores.iter()) {
            if score <= settings.rejection_threshold {
                rejected[pos] = true;
            } else {
                cluster.members[pos].matching_point = settings.calibration.apply(score);
            }
        }

        let mut kept = Vec::with_capacity(cluster.members.len());
        for (member, reject) in cluster.members.drain(..).zip(rejected) {
            if reject {
                outcome
                    .evicted
                    .push(DraftCluster::singleton(member.index, keywords));
            } else {
                kept.push(member);
            }
        }
        cluster.members = kept;
    }

    if !outcome.evicted.is_empty() || outcome.failed_clusters > 0 {
        tracing::debug!(
            scorer = scorer.name(),
            evicted = outcome.evicted.len(),
            failed = outcome.failed_clusters,
            "Refinement complete"
        );
    }

    outcome
}
