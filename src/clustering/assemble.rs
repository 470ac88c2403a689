//! Turning labels into named clusters and the final output.

use std::collections::{BTreeMap, HashSet};

use crate::intent::Intent;

use super::naming::{matching_points, name_cluster};
use super::similarity::round1;
use super::types::{
    ClusterSummary, ClusteringOutput, Keyword, KeywordOutput, TopicCluster,
};

/// A cluster member before output formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftMember {
    /// Input index.
    pub index: usize,
    pub matching_point: f64,
}

impl DraftMember {
    pub fn new(index: usize, matching_point: f64) -> Self {
        Self {
            index,
            matching_point,
        }
    }
}

/// A named cluster before output formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftCluster {
    pub name: String,
    /// Input index of the naming keyword.
    pub anchor: Option<usize>,
    /// Members in input order.
    pub members: Vec<DraftMember>,
}

impl DraftCluster {
    /// A one-keyword cluster named after the keyword.
    pub fn singleton(index: usize, keywords: &[Keyword]) -> Self {
        Self {
            name: keywords[index].text.clone(),
            anchor: Some(index),
            members: vec![DraftMember::new(index, 100.0)],
        }
    }

    pub fn total_volume(&self, keywords: &[Keyword]) -> u64 {
        self.members.iter().map(|m| keywords[m.index].volume).sum()
    }

    fn first_index(&self) -> usize {
        self.members.iter().map(|m| m.index).min().unwrap_or(usize::MAX)
    }
}

/// Drafts built from final labels.
#[derive(Debug, Default)]
pub struct Drafts {
    /// Multi-member clusters in descending volume order.
    pub clusters: Vec<DraftCluster>,
    /// One singleton per noise keyword, in input order.
    pub noise: Vec<DraftCluster>,
}

impl Drafts {
    pub fn noise_volume(&self, keywords: &[Keyword]) -> u64 {
        self.noise.iter().map(|c| c.total_volume(keywords)).sum()
    }
}

/// Group keywords by label, name each group and score its members.
pub fn build_drafts(keywords: &[Keyword]) -> Drafts {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    let mut noise = Vec::new();

    for keyword in keywords {
        match keyword.label {
            Some(id) => groups.entry(id).or_default().push(keyword.index),
            None => noise.push(DraftCluster::singleton(keyword.index, keywords)),
        }
    }

    let mut ranked: Vec<Vec<usize>> = groups.into_values().collect();
    ranked.sort_by(|a, b| {
        let va: u64 = a.iter().map(|&i| keywords[i].volume).sum();
        let vb: u64 = b.iter().map(|&i| keywords[i].volume).sum();
        vb.cmp(&va).then(a[0].cmp(&b[0]))
    });

    let clusters = ranked
        .into_iter()
        .enumerate()
        .map(|(rank, members)| {
            let name = name_cluster(&members, keywords, rank + 1);
            let points = matching_points(&members, keywords, name.anchor);
            DraftCluster {
                name: name.name,
                anchor: name.anchor,
                members: members
                    .into_iter()
                    .zip(points)
                    .map(|(index, point)| DraftMember::new(index, point))
                    .collect(),
            }
        })
        .collect();

    Drafts { clusters, noise }
}

/// Most frequent member intent; ties go to the one seen first.
pub fn dominant_intent(members: &[DraftMember], keywords: &[Keyword]) -> Intent {
    let mut counts: Vec<(Intent, usize)> = Vec::new();
    for member in members {
        let intent = keywords[member.index].intent.intent;
        match counts.iter_mut().find(|(i, _)| *i == intent) {
            Some((_, c)) => *c += 1,
            None => counts.push((intent, 1)),
        }
    }

    let mut best: Option<(Intent, usize)> = None;
    for (intent, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((intent, count));
        }
    }
    best.map(|(i, _)| i).unwrap_or_default()
}

/// Noise accounting carried into the summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoiseTally {
    pub keywords: usize,
    pub volume: u64,
}

/// Build the final output.
///
/// Clusters are ordered by descending total volume, ties by the earliest
/// member. Repeated names get ` (2)`, ` (3)` suffixes so every map key is
/// unique.
pub fn assemble_output(
    drafts: Vec<DraftCluster>,
    keywords: &[Keyword],
    noise: NoiseTally,
) -> ClusteringOutput {
    let mut drafts: Vec<DraftCluster> = drafts.into_iter().filter(|d| !d.members.is_empty()).collect();
    drafts.sort_by(|a, b| {
        b.total_volume(keywords)
            .cmp(&a.total_volume(keywords))
            .then(a.first_index().cmp(&b.first_index()))
    });

    let mut used: HashSet<String> = HashSet::new();
    let mut clusters = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let name = unique_name(&draft.name, &mut used);
        let total_volume_topic = draft.total_volume(keywords);
        let dominant_intent = dominant_intent(&draft.members, keywords);

        let members = draft
            .members
            .iter()
            .map(|m| {
                let keyword = &keywords[m.index];
                KeywordOutput {
                    text: keyword.text.clone(),
                    volume: keyword.volume,
                    matching_point: m.matching_point,
                    intent: keyword.intent.intent,
                    sub_intent: keyword.intent.sub_intent,
                }
            })
            .collect();

        clusters.push(TopicCluster {
            cluster_name: name,
            keywords: members,
            total_volume_topic,
            dominant_intent,
        });
    }

    let total_volume: u64 = keywords.iter().map(|k| k.volume).sum();
    let top10: u64 = clusters.iter().take(10).map(|c| c.total_volume_topic).sum();
    let top10_cluster_volume_percent = if total_volume > 0 {
        round1(top10 as f64 / total_volume as f64 * 100.0)
    } else {
        0.0
    };

    let summary = ClusterSummary {
        total_keywords_processed: keywords.len(),
        total_clusters_found: clusters.len(),
        top10_cluster_volume_percent,
        noise_keywords_found: noise.keywords,
        noise_volume: noise.volume,
    };

    ClusteringOutput {
        clusters,
        unclustered_keywords: Vec::new(),
        summary,
    }
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{} ({})", name, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
