//! Neighbor-graph dimensionality reduction.
//!
//! Builds a fuzzy k-nearest-neighbor graph over cosine distance and lays it
//! out in a handful of dimensions with stochastic gradient descent, the same
//! construction UMAP uses with `min_dist = 0`. The output keeps local
//! neighborhoods tight, which is what the density clusterer needs.
//!
//! All randomness comes from one seeded generator, so identical input and
//! parameters always produce identical coordinates.

use std::collections::HashMap;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::error::{ClusteringError, Result};

use super::features::HybridFeatures;

/// Curve parameters for `min_dist = 0`, `spread = 1`.
const CURVE_A: f64 = 1.929;
const CURVE_B: f64 = 0.7915;

const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const MIN_K_DIST_SCALE: f64 = 1e-3;
const NEGATIVE_SAMPLE_RATE: usize = 5;
const GRADIENT_CLIP: f64 = 4.0;
const INIT_RANGE: f64 = 10.0;

/// Reducer parameters.
#[derive(Debug, Clone)]
pub struct ReductionParams {
    pub n_neighbors: usize,
    pub n_components: usize,
    pub seed: u64,
    /// Brute-force neighbor search up to this many points; NN-descent above.
    pub exact_knn_limit: usize,
    /// Layout epochs; `None` picks 500 for up to 10k points and 200 above.
    pub n_epochs: Option<usize>,
}

impl ReductionParams {
    pub fn new(n_neighbors: usize, n_components: usize, seed: u64) -> Self {
        Self {
            n_neighbors,
            n_components,
            seed,
            exact_knn_limit: 2000,
            n_epochs: None,
        }
    }

    /// Clamp neighbor and component counts to what `n` points can support.
    pub fn clamped(mut self, n: usize) -> Self {
        if n >= 2 && self.n_components >= n.saturating_sub(1) {
            self.n_components = 2.max(n.saturating_sub(2).min(5));
        }
        if self.n_neighbors >= n {
            self.n_neighbors = 2.max(n.saturating_sub(1));
        }
        self
    }
}

/// Reduce feature rows to `n_components` dimensions.
pub fn reduce(features: &HybridFeatures, params: &ReductionParams) -> Result<Vec<Vec<f64>>> {
    let n = features.len();
    if n < 3 {
        return Err(ClusteringError::Reduction(format!(
            "need at least 3 points to reduce, got {}",
            n
        ))
        .into());
    }
    if params.n_components == 0 {
        return Err(ClusteringError::Reduction("n_components must be > 0".to_string()).into());
    }

    let k = params.n_neighbors.clamp(1, n - 1);
    let mut rng = StdRng::seed_from_u64(params.seed);

    let knn = if n <= params.exact_knn_limit {
        exact_knn(features, k)
    } else {
        nn_descent(features, k, &mut rng)
    };

    let edges = fuzzy_graph(&knn, k);
    let n_epochs = params
        .n_epochs
        .unwrap_or(if n <= 10_000 { 500 } else { 200 });

    tracing::debug!(
        points = n,
        neighbors = k,
        components = params.n_components,
        edges = edges.len(),
        epochs = n_epochs,
        "Reducing features"
    );

    let layout = optimize_layout(n, params.n_components, &edges, n_epochs, &mut rng);

    Ok(layout.outer_iter().map(|row| row.to_vec()).collect())
}

/// Neighbor lists sorted by ascending distance, self excluded.
pub(crate) type KnnGraph = Vec<Vec<(usize, f32)>>;

pub(crate) fn exact_knn(features: &HybridFeatures, k: usize) -> KnnGraph {
    let n = features.len();
    (0..n)
        .map(|i| {
            let mut row: Vec<(usize, f32)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, features.distance(i, j)))
                .collect();
            row.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            row.truncate(k);
            row
        })
        .collect()
}

/// Approximate kNN by iterated neighbor-of-neighbor joins.
pub(crate) fn nn_descent(features: &HybridFeatures, k: usize, rng: &mut StdRng) -> KnnGraph {
    let n = features.len();
    let max_candidates = (2 * k).min(20).max(k);
    let max_iters = 12;

    let mut graph: KnnGraph = Vec::with_capacity(n);
    let draw = (k + 1).min(n);
    for i in 0..n {
        let mut row: Vec<(usize, f32)> = index::sample(rng, n, draw)
            .into_iter()
            .filter(|&j| j != i)
            .take(k)
            .map(|j| (j, features.distance(i, j)))
            .collect();
        row.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        graph.push(row);
    }

    for iteration in 0..max_iters {
        let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, row) in graph.iter().enumerate() {
            for &(j, _) in row {
                if reverse[j].len() < max_candidates {
                    reverse[j].push(i);
                }
            }
        }

        let mut updates = 0usize;
        for i in 0..n {
            let mut candidates: Vec<usize> = graph[i].iter().map(|&(j, _)| j).collect();
            for &r in &reverse[i] {
                if !candidates.contains(&r) {
                    candidates.push(r);
                }
            }
            candidates.truncate(max_candidates);

            for a in 0..candidates.len() {
                for b in (a + 1)..candidates.len() {
                    let (p, q) = (candidates[a], candidates[b]);
                    let d = features.distance(p, q);
                    updates += usize::from(try_insert(&mut graph[p], q, d, k));
                    updates += usize::from(try_insert(&mut graph[q], p, d, k));
                }
            }
        }

        tracing::trace!(iteration, updates, "NN-descent pass");
        if (updates as f64) <= 0.001 * (n * k) as f64 {
            break;
        }
    }

    graph
}

fn try_insert(row: &mut Vec<(usize, f32)>, j: usize, d: f32, k: usize) -> bool {
    if row.len() >= k {
        if let Some(&(_, worst)) = row.last() {
            if d >= worst {
                return false;
            }
        }
    }
    if row.iter().any(|&(existing, _)| existing == j) {
        return false;
    }
    let pos = row
        .iter()
        .position(|&(idx, dist)| d < dist || (d == dist && j < idx))
        .unwrap_or(row.len());
    row.insert(pos, (j, d));
    row.truncate(k);
    true
}

/// Per-point `(rho, sigma)` so that memberships sum to `log2(k)`.
fn smooth_knn_dist(knn: &KnnGraph, k: usize) -> Vec<(f64, f64)> {
    let target = (k as f64).log2();
    let mean_all = {
        let (sum, count) = knn
            .iter()
            .flatten()
            .fold((0.0f64, 0usize), |(s, c), &(_, d)| (s + d as f64, c + 1));
        if count > 0 {
            sum / count as f64
        } else {
            0.0
        }
    };

    knn.iter()
        .map(|row| {
            let distances: Vec<f64> = row.iter().map(|&(_, d)| d as f64).collect();
            let rho = distances.iter().copied().find(|d| *d > 0.0).unwrap_or(0.0);

            let (mut lo, mut hi, mut mid) = (0.0f64, f64::INFINITY, 1.0f64);
            for _ in 0..64 {
                let psum: f64 = distances
                    .iter()
                    .map(|d| {
                        let shifted = d - rho;
                        if shifted > 0.0 {
                            (-shifted / mid).exp()
                        } else {
                            1.0
                        }
                    })
                    .sum();

                if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                    break;
                }
                if psum > target {
                    hi = mid;
                    mid = (lo + hi) / 2.0;
                } else {
                    lo = mid;
                    mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
                }
            }

            let floor = if rho > 0.0 {
                let mean = distances.iter().sum::<f64>() / distances.len().max(1) as f64;
                MIN_K_DIST_SCALE * mean
            } else {
                MIN_K_DIST_SCALE * mean_all
            };
            (rho, mid.max(floor))
        })
        .collect()
}

/// Symmetric fuzzy union `a + b - ab` of the directed membership graph.
///
/// Returns directed edges (both directions) sorted by `(head, tail)`.
fn fuzzy_graph(knn: &KnnGraph, k: usize) -> Vec<(usize, usize, f64)> {
    let params = smooth_knn_dist(knn, k);

    let mut directed: HashMap<(usize, usize), f64> = HashMap::new();
    for (i, row) in knn.iter().enumerate() {
        let (rho, sigma) = params[i];
        for &(j, d) in row {
            let shifted = d as f64 - rho;
            let w = if shifted <= 0.0 || sigma == 0.0 {
                1.0
            } else {
                (-shifted / sigma).exp()
            };
            directed.insert((i, j), w);
        }
    }

    let mut edges: Vec<(usize, usize, f64)> = Vec::with_capacity(directed.len() * 2);
    for (&(i, j), &w_ij) in &directed {
        let w_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let w = w_ij + w_ji - w_ij * w_ji;
        edges.push((i, j, w));
        if w_ji == 0.0 {
            edges.push((j, i, w));
        }
    }
    edges.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    edges.retain(|e| e.2 > 0.0);
    edges
}

fn clip(value: f64) -> f64 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn optimize_layout(
    n: usize,
    dim: usize,
    edges: &[(usize, usize, f64)],
    n_epochs: usize,
    rng: &mut StdRng,
) -> Array2<f64> {
    let mut embedding = Array2::from_shape_fn((n, dim), |_| rng.gen_range(-INIT_RANGE..INIT_RANGE));

    let max_w = edges.iter().map(|e| e.2).fold(0.0f64, f64::max);
    if max_w <= 0.0 || n_epochs == 0 {
        return embedding;
    }

    // Edges too weak to be sampled once over the run are dropped.
    let min_w = max_w / n_epochs as f64;
    let edges: Vec<&(usize, usize, f64)> = edges.iter().filter(|e| e.2 >= min_w).collect();

    let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_w / e.2).collect();
    let epochs_per_negative: Vec<f64> = epochs_per_sample
        .iter()
        .map(|e| e / NEGATIVE_SAMPLE_RATE as f64)
        .collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    for epoch in 0..n_epochs {
        let alpha = 1.0 - epoch as f64 / n_epochs as f64;
        let epoch_f = epoch as f64;

        for (e, &&(i, j, _)) in edges.iter().enumerate() {
            if next_sample[e] > epoch_f {
                continue;
            }

            let dist2 = squared_distance(&embedding, i, j);
            let grad_coeff = if dist2 > 0.0 {
                -2.0 * CURVE_A * CURVE_B * dist2.powf(CURVE_B - 1.0)
                    / (CURVE_A * dist2.powf(CURVE_B) + 1.0)
            } else {
                0.0
            };
            for d in 0..dim {
                let grad = clip(grad_coeff * (embedding[[i, d]] - embedding[[j, d]])) * alpha;
                embedding[[i, d]] += grad;
                embedding[[j, d]] -= grad;
            }
            next_sample[e] += epochs_per_sample[e];

            let n_neg = ((epoch_f - next_negative[e]) / epochs_per_negative[e]).floor().max(0.0) as usize;
            for _ in 0..n_neg {
                let other = rng.gen_range(0..n);
                if other == i {
                    continue;
                }
                let dist2 = squared_distance(&embedding, i, other);
                let grad_coeff = if dist2 > 0.0 {
                    2.0 * CURVE_B / ((0.001 + dist2) * (CURVE_A * dist2.powf(CURVE_B) + 1.0))
                } else {
                    0.0
                };
                for d in 0..dim {
                    let grad = if grad_coeff > 0.0 {
                        clip(grad_coeff * (embedding[[i, d]] - embedding[[other, d]]))
                    } else {
                        GRADIENT_CLIP
                    };
                    embedding[[i, d]] += grad * alpha;
                }
            }
            next_negative[e] += n_neg as f64 * epochs_per_negative[e];
        }
    }

    embedding
}

fn squared_distance(embedding: &Array2<f64>, i: usize, j: usize) -> f64 {
    embedding
        .row(i)
        .iter()
        .zip(embedding.row(j).iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum()
}
