//! Cluster naming and member scoring.

use super::similarity::{compute_centroid, cosine_similarity, to_matching_point};
use super::types::Keyword;

/// A cluster's display name and the keyword it was taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterName {
    pub name: String,
    /// Input index of the naming keyword.
    pub anchor: Option<usize>,
}

/// Name a cluster after its highest-volume member.
///
/// `members` are input indices in input order; ties go to the earliest.
/// An empty cluster gets the placeholder `Topic {rank}`.
pub fn name_cluster(members: &[usize], keywords: &[Keyword], rank: usize) -> ClusterName {
    let mut best: Option<usize> = None;
    for &idx in members {
        match best {
            Some(b) if keywords[idx].volume <= keywords[b].volume => {}
            _ => best = Some(idx),
        }
    }

    match best {
        Some(idx) => ClusterName {
            name: keywords[idx].text.clone(),
            anchor: Some(idx),
        },
        None => ClusterName {
            name: format!("Topic {}", rank),
            anchor: None,
        },
    }
}

/// Matching point of every member against the cluster name.
///
/// Compares against the anchor's embedding; without an anchor the member
/// centroid is used. Returns one value per member, in member order.
pub fn matching_points(members: &[usize], keywords: &[Keyword], anchor: Option<usize>) -> Vec<f64> {
    let reference: Vec<f32> = match anchor {
        Some(idx) => keywords[idx].embedding.clone(),
        None => compute_centroid(members.iter().map(|&i| keywords[i].embedding.as_slice())),
    };

    if reference.is_empty() {
        return vec![100.0; members.len()];
    }

    members
        .iter()
        .map(|&i| to_matching_point(cosine_similarity(&keywords[i].embedding, &reference)))
        .collect()
}
