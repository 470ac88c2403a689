//! Folding noise points into the nearest sufficiently similar cluster.

use std::collections::BTreeMap;

use super::similarity::{compute_centroid, cosine_similarity};
use super::types::Label;

/// Outcome counts of a reassignment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassignStats {
    pub reassigned: usize,
    pub remaining_noise: usize,
}

/// Assign each noise point to the cluster whose centroid it is most similar
/// to, if that similarity reaches `threshold`.
///
/// Centroids are computed once from the original dense embeddings before
/// any point moves. Ties go to the lowest cluster id.
pub fn reassign_noise(
    labels: &mut [Label],
    embeddings: &[Vec<f32>],
    threshold: f32,
) -> ReassignStats {
    let mut members: BTreeMap<usize, Vec<&[f32]>> = BTreeMap::new();
    for (label, embedding) in labels.iter().zip(embeddings.iter()) {
        if let Some(id) = label {
            members.entry(*id).or_default().push(embedding.as_slice());
        }
    }

    let noise_count = labels.iter().filter(|l| l.is_none()).count();
    if members.is_empty() || noise_count == 0 {
        return ReassignStats {
            reassigned: 0,
            remaining_noise: noise_count,
        };
    }

    let centroids: Vec<(usize, Vec<f32>)> = members
        .into_iter()
        .map(|(id, vectors)| (id, compute_centroid(vectors)))
        .collect();

    let mut stats = ReassignStats::default();
    for (label, embedding) in labels.iter_mut().zip(embeddings.iter()) {
        if label.is_some() {
            continue;
        }

        let mut best: Option<(usize, f64)> = None;
        for (id, centroid) in &centroids {
            let sim = cosine_similarity(embedding, centroid);
            if best.map_or(true, |(_, b)| sim > b) {
                best = Some((*id, sim));
            }
        }

        match best {
            Some((id, sim)) if sim >= threshold as f64 => {
                *label = Some(id);
                stats.reassigned += 1;
            }
            _ => stats.remaining_noise += 1,
        }
    }

    tracing::debug!(
        reassigned = stats.reassigned,
        remaining = stats.remaining_noise,
        threshold,
        "Noise reassignment complete"
    );
    stats
}

/// Group noise points whose pairwise similarity reaches `threshold` into
/// new clusters, numbered after the existing ones.
///
/// Used for inputs too small for the density clusterer to find structure.
/// Linkage is single: a point joins a group if it is close enough to any
/// member. Groups of one stay noise. Returns the number of clusters added.
pub fn seed_noise_clusters(
    labels: &mut [Label],
    embeddings: &[Vec<f32>],
    threshold: f32,
) -> usize {
    let noise: Vec<usize> = (0..labels.len()).filter(|&i| labels[i].is_none()).collect();
    if noise.len() < 2 {
        return 0;
    }

    let mut parent: Vec<usize> = (0..noise.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for a in 0..noise.len() {
        for b in (a + 1)..noise.len() {
            let sim = cosine_similarity(&embeddings[noise[a]], &embeddings[noise[b]]);
            if sim >= threshold as f64 {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra.max(rb)] = ra.min(rb);
                }
            }
        }
    }

    let roots: Vec<usize> = (0..noise.len()).map(|i| find(&mut parent, i)).collect();
    let mut next = labels.iter().flatten().max().map_or(0, |&id| id + 1);
    let mut assigned: BTreeMap<usize, usize> = BTreeMap::new();
    for (slot, &root) in roots.iter().enumerate() {
        if roots.iter().filter(|&&r| r == root).count() < 2 {
            continue;
        }
        let id = *assigned.entry(root).or_insert_with(|| {
            next += 1;
            next - 1
        });
        labels[noise[slot]] = Some(id);
    }

    if !assigned.is_empty() {
        tracing::debug!(seeded = assigned.len(), threshold, "Seeded clusters from noise");
    }
    assigned.len()
}
