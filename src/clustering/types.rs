//! Typed records flowing through the clustering pipeline.

use std::fmt;
use std::str::FromStr;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InputError;
use crate::intent::{Intent, IntentLabel, SubIntent};
use crate::processing::parse_volume;

// ============================================================================
// Request types
// ============================================================================

/// Granularity tier controlling how aggressively keywords are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Fewer, larger clusters.
    #[serde(alias = "thấp", alias = "broad", alias = "low")]
    Coarse,
    #[default]
    #[serde(alias = "trung bình", alias = "medium")]
    Balanced,
    /// Many small clusters.
    #[serde(alias = "cao", alias = "granular", alias = "high")]
    Fine,
}

/// Reduction and density parameters for one detail level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelProfile {
    pub n_neighbors: usize,
    pub n_components: usize,
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub cluster_selection_epsilon: f64,
}

impl DetailLevel {
    /// Parameter profile for this level.
    pub fn profile(&self) -> LevelProfile {
        match self {
            DetailLevel::Coarse => LevelProfile {
                n_neighbors: 30,
                n_components: 5,
                min_cluster_size: 10,
                min_samples: 5,
                cluster_selection_epsilon: 0.3,
            },
            DetailLevel::Balanced => LevelProfile {
                n_neighbors: 10,
                n_components: 5,
                min_cluster_size: 5,
                min_samples: 2,
                cluster_selection_epsilon: 0.1,
            },
            DetailLevel::Fine => LevelProfile {
                n_neighbors: 5,
                n_components: 15,
                min_cluster_size: 3,
                min_samples: 1,
                cluster_selection_epsilon: 0.0,
            },
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Coarse => "coarse",
            DetailLevel::Balanced => "balanced",
            DetailLevel::Fine => "fine",
        }
    }
}

impl FromStr for DetailLevel {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coarse" | "broad" | "low" | "thấp" => Ok(DetailLevel::Coarse),
            "balanced" | "medium" | "trung bình" => Ok(DetailLevel::Balanced),
            "fine" | "granular" | "high" | "cao" => Ok(DetailLevel::Fine),
            other => Err(InputError::UnknownLevel(other.to_string())),
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How keywords are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringMethod {
    #[default]
    Semantic,
    /// Accepted for compatibility; runs the semantic pipeline.
    Serp,
}

impl FromStr for ClusteringMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "semantic" => Ok(ClusteringMethod::Semantic),
            "serp" => Ok(ClusteringMethod::Serp),
            other => Err(format!("unknown clustering method: {}", other)),
        }
    }
}

/// One input keyword with its search volume.
///
/// Deserialization is lenient: numeric text is stringified, any other
/// non-string text becomes empty, and volume accepts numbers or loosely
/// formatted strings (`"1,234"`), falling back to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordInput {
    #[serde(deserialize_with = "lenient_text")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_volume")]
    pub volume: u64,
}

impl KeywordInput {
    pub fn new(text: impl Into<String>, volume: u64) -> Self {
        Self {
            text: text.into(),
            volume,
        }
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_volume<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(parse_volume(&Value::deserialize(deserializer)?))
}

/// A clustering request as accepted by the API, the CLI and the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub keywords: Vec<KeywordInput>,
    /// `None` uses the configured default level.
    #[serde(default, alias = "detail_level")]
    pub level: Option<DetailLevel>,
    #[serde(default, alias = "min_cluster_size_override")]
    pub min_cluster_size: Option<usize>,
    #[serde(default, alias = "method")]
    pub clustering_method: ClusteringMethod,
}

impl ClusterRequest {
    pub fn new(keywords: Vec<KeywordInput>) -> Self {
        Self {
            keywords,
            level: None,
            min_cluster_size: None,
            clustering_method: ClusteringMethod::default(),
        }
    }

    pub fn with_level(mut self, level: DetailLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_min_cluster_size(mut self, size: Option<usize>) -> Self {
        self.min_cluster_size = size;
        self
    }

    pub fn with_method(mut self, method: ClusteringMethod) -> Self {
        self.clustering_method = method;
        self
    }
}

// ============================================================================
// Pipeline records
// ============================================================================

/// Cluster id, or `None` for noise.
pub type Label = Option<usize>;

/// Everything known about one input row, carried through every stage.
#[derive(Debug, Clone)]
pub struct Keyword {
    /// Position in the input.
    pub index: usize,
    /// Text as supplied.
    pub text: String,
    /// Normalized text sent to the encoder.
    pub normalized: String,
    pub volume: u64,
    /// Unit-length dense embedding.
    pub embedding: Vec<f32>,
    pub intent: IntentLabel,
    pub label: Label,
}

// ============================================================================
// Output types
// ============================================================================

/// One member of an output cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordOutput {
    pub text: String,
    pub volume: u64,
    /// Similarity to the cluster name, 0 to 100.
    pub matching_point: f64,
    #[serde(default)]
    pub intent: Intent,
    #[serde(default)]
    pub sub_intent: SubIntent,
}

/// A named topic cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCluster {
    pub cluster_name: String,
    pub keywords: Vec<KeywordOutput>,
    pub total_volume_topic: u64,
    #[serde(default)]
    pub dominant_intent: Intent,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub total_keywords_processed: usize,
    pub total_clusters_found: usize,
    pub top10_cluster_volume_percent: f64,
    pub noise_keywords_found: usize,
    pub noise_volume: u64,
}

/// Result of one clustering run.
///
/// `clusters` serializes as a JSON object keyed by cluster name, in
/// descending total-volume order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringOutput {
    #[serde(
        serialize_with = "serialize_cluster_map",
        deserialize_with = "deserialize_cluster_map"
    )]
    pub clusters: Vec<TopicCluster>,
    pub unclustered_keywords: Vec<KeywordOutput>,
    pub summary: ClusterSummary,
}

impl ClusteringOutput {
    /// Look up a cluster by name.
    pub fn cluster(&self, name: &str) -> Option<&TopicCluster> {
        self.clusters.iter().find(|c| c.cluster_name == name)
    }

    /// Number of keywords across clusters and the unclustered list.
    pub fn keyword_count(&self) -> usize {
        self.clusters.iter().map(|c| c.keywords.len()).sum::<usize>()
            + self.unclustered_keywords.len()
    }
}

fn serialize_cluster_map<S: Serializer>(
    clusters: &[TopicCluster],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(clusters.len()))?;
    for cluster in clusters {
        map.serialize_entry(&cluster.cluster_name, cluster)?;
    }
    map.end()
}

fn deserialize_cluster_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<TopicCluster>, D::Error> {
    struct ClusterMapVisitor;

    impl<'de> Visitor<'de> for ClusterMapVisitor {
        type Value = Vec<TopicCluster>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of cluster name to cluster")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut clusters = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, mut cluster)) = access.next_entry::<String, TopicCluster>()? {
                if cluster.cluster_name.is_empty() {
                    cluster.cluster_name = name;
                }
                clusters.push(cluster);
            }
            // Map order is not guaranteed to survive a round trip.
            clusters.sort_by(|a, b| b.total_volume_topic.cmp(&a.total_volume_topic));
            Ok(clusters)
        }
    }

    deserializer.deserialize_map(ClusterMapVisitor)
}
