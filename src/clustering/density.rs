//! Density-based clustering over reduced coordinates.

use std::collections::BTreeSet;

use hdbscan::{Hdbscan, HdbscanHyperParams};

use crate::error::{ClusteringError, Result};

use super::types::{Label, LevelProfile};

/// Resolved HDBSCAN parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityParams {
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub epsilon: f64,
    pub allow_single_cluster: bool,
}

impl DensityParams {
    /// Combine the level profile, any size override and the input size.
    ///
    /// Small inputs get the minimum cluster size clamped to
    /// `[2, max(2, n / 2)]` and may form a single cluster.
    pub fn resolve(
        profile: &LevelProfile,
        min_cluster_size: Option<usize>,
        n: usize,
        small_input_threshold: usize,
    ) -> Self {
        let small = n < small_input_threshold;
        let mut size = min_cluster_size.unwrap_or(profile.min_cluster_size).max(2);
        if small {
            size = size.clamp(2, 2.max(n / 2));
        }
        let min_samples = profile.min_samples.clamp(1, n.saturating_sub(1).max(1));

        Self {
            min_cluster_size: size,
            min_samples,
            epsilon: profile.cluster_selection_epsilon,
            allow_single_cluster: small,
        }
    }
}

/// Assigns a cluster id or noise to every point.
pub trait DensityClusterer: Send + Sync {
    /// Cluster points; returns one label per point.
    fn cluster(&self, points: &[Vec<f64>], params: &DensityParams) -> Result<Vec<Label>>;

    /// Get the name of this clusterer.
    fn name(&self) -> &str;
}

/// HDBSCAN with Euclidean distance.
#[derive(Debug, Default, Clone, Copy)]
pub struct HdbscanClusterer;

impl HdbscanClusterer {
    pub fn new() -> Self {
        Self
    }
}

impl DensityClusterer for HdbscanClusterer {
    fn cluster(&self, points: &[Vec<f64>], params: &DensityParams) -> Result<Vec<Label>> {
        if points.len() < 2 {
            return Ok(vec![None; points.len()]);
        }

        let hyper_params = HdbscanHyperParams::builder()
            .min_cluster_size(params.min_cluster_size)
            .min_samples(params.min_samples)
            .epsilon(params.epsilon)
            .allow_single_cluster(params.allow_single_cluster)
            .build();

        let clusterer = Hdbscan::new(points, hyper_params);
        let raw = clusterer
            .cluster()
            .map_err(|e| ClusteringError::Density(format!("HDBSCAN failed: {:?}", e)))?;

        let labels = compact_labels(&raw);
        tracing::debug!(
            points = points.len(),
            min_cluster_size = params.min_cluster_size,
            clusters = labels.iter().flatten().collect::<BTreeSet<_>>().len(),
            noise = labels.iter().filter(|l| l.is_none()).count(),
            "Density clustering complete"
        );
        Ok(labels)
    }

    fn name(&self) -> &str {
        "hdbscan"
    }
}

/// Map raw labels (negative = noise) onto dense ids `0..k`, preserving order.
pub fn compact_labels(raw: &[i32]) -> Vec<Label> {
    let ids: Vec<i32> = raw
        .iter()
        .copied()
        .filter(|&l| l >= 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    raw.iter()
        .map(|&l| {
            if l < 0 {
                None
            } else {
                ids.binary_search(&l).ok()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::DetailLevel;

    #[test]
    fn test_resolve_uses_profile() {
        let profile = DetailLevel::Balanced.profile();
        let params = DensityParams::resolve(&profile, None, 500, 10);
        assert_eq!(params.min_cluster_size, 5);
        assert_eq!(params.min_samples, 2);
        assert!(!params.allow_single_cluster);
    }

    #[test]
    fn test_resolve_override_and_small_input() {
        let profile = DetailLevel::Coarse.profile();
        let params = DensityParams::resolve(&profile, Some(8), 500, 10);
        assert_eq!(params.min_cluster_size, 8);

        let params = DensityParams::resolve(&profile, None, 3, 10);
        assert_eq!(params.min_cluster_size, 2);
        assert_eq!(params.min_samples, 2);
        assert!(params.allow_single_cluster);

        let params = DensityParams::resolve(&profile, None, 8, 10);
        assert_eq!(params.min_cluster_size, 4);
    }

    #[test]
    fn test_compact_labels() {
        let labels = compact_labels(&[3, -1, 7, 3, 7, -1]);
        assert_eq!(labels, vec![Some(0), None, Some(1), Some(0), Some(1), None]);
    }

    #[test]
    fn test_fewer_than_two_points_is_noise() {
        let clusterer = HdbscanClusterer::new();
        let params = DensityParams::resolve(&DetailLevel::Balanced.profile(), None, 1, 10);
        let labels = clusterer.cluster(&[vec![0.0, 0.0]], &params).unwrap();
        assert_eq!(labels, vec![None]);
    }

    #[test]
    fn test_hdbscan_separates_groups() {
        let mut points = Vec::new();
        for i in 0..12 {
            points.push(vec![0.0 + i as f64 * 0.01, 0.0]);
        }
        for i in 0..12 {
            points.push(vec![10.0 + i as f64 * 0.01, 10.0]);
        }

        let params = DensityParams {
            min_cluster_size: 5,
            min_samples: 2,
            epsilon: 0.0,
            allow_single_cluster: false,
        };
        let labels = HdbscanClusterer::new().cluster(&points, &params).unwrap();

        assert!(labels[0].is_some());
        assert!(labels[12].is_some());
        assert_ne!(labels[0], labels[12]);
        assert!(labels[..12].iter().all(|l| *l == labels[0]));
        assert!(labels[12..].iter().all(|l| *l == labels[12]));
    }
}
