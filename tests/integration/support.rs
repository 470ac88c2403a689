//! Deterministic test doubles shared by the integration tests.

use std::sync::Arc;

use async_trait::async_trait;

use kwcluster::clustering::{DensityClusterer, DensityParams, Label};
use kwcluster::error::{EmbeddingError, Result};
use kwcluster::{
    CachedEmbedder, ClusteringPipeline, Config, EmbeddingCache, EmbeddingProvider, KeywordInput,
    RelevanceScorer,
};

/// Topic words and the axis each one lights up.
const TOPICS: [(&str, usize); 5] = [
    ("vàng", 0),
    ("laptop", 1),
    ("thời tiết", 2),
    ("bóng đá", 3),
    ("du lịch", 4),
];

const DIMENSION: usize = 16;

fn fnv(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in text.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Embeds keywords by the topic words they contain, plus a small
/// text-dependent jitter so no two texts are identical.
pub struct TopicEmbedder;

impl TopicEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMENSION];
        let mut matched = false;
        for (word, axis) in TOPICS {
            if text.contains(word) {
                v[axis] += 1.0;
                matched = true;
            }
        }

        let hash = fnv(text);
        if !matched {
            v[5 + (hash % 5) as usize] = 1.0;
        }
        for j in 0..6 {
            let bits = (hash >> (j * 8)) & 0xff;
            v[10 + j] = bits as f32 / 255.0 * 0.08;
        }

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_id(&self) -> &str {
        "topic-test"
    }
}

/// An encoder that is never available.
pub struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(EmbeddingError::Unavailable("model not loaded".to_string()).into())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_id(&self) -> &str {
        "unavailable"
    }
}

/// Groups points whose Euclidean distance is below `radius` (single
/// linkage). Components smaller than the minimum cluster size are noise.
pub struct LinkClusterer {
    pub radius: f64,
}

impl DensityClusterer for LinkClusterer {
    fn cluster(&self, points: &[Vec<f64>], params: &DensityParams) -> Result<Vec<Label>> {
        let n = points.len();
        let mut component: Vec<usize> = (0..n).collect();

        fn root(component: &mut [usize], mut i: usize) -> usize {
            while component[i] != i {
                component[i] = component[component[i]];
                i = component[i];
            }
            i
        }

        for i in 0..n {
            for j in (i + 1)..n {
                let d: f64 = points[i]
                    .iter()
                    .zip(&points[j])
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                if d < self.radius {
                    let (ri, rj) = (root(&mut component, i), root(&mut component, j));
                    if ri != rj {
                        component[ri.max(rj)] = ri.min(rj);
                    }
                }
            }
        }

        let roots: Vec<usize> = (0..n).map(|i| root(&mut component, i)).collect();
        let mut ids: Vec<usize> = Vec::new();
        let mut labels = vec![None; n];
        for i in 0..n {
            let size = roots.iter().filter(|&&r| r == roots[i]).count();
            if size < params.min_cluster_size {
                continue;
            }
            let id = match ids.iter().position(|&r| r == roots[i]) {
                Some(id) => id,
                None => {
                    ids.push(roots[i]);
                    ids.len() - 1
                }
            };
            labels[i] = Some(id);
        }
        Ok(labels)
    }

    fn name(&self) -> &str {
        "link"
    }
}

/// Scores documents from a fixed table; unknown documents score `default`.
pub struct TableScorer {
    pub scores: Vec<(String, f32)>,
    pub default: f32,
}

impl RelevanceScorer for TableScorer {
    fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
        Ok(documents
            .iter()
            .map(|d| {
                self.scores
                    .iter()
                    .find(|(t, _)| t == d)
                    .map(|(_, s)| *s)
                    .unwrap_or(self.default)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "table"
    }
}

pub fn topic_embedder() -> CachedEmbedder {
    CachedEmbedder::new(Arc::new(TopicEmbedder), EmbeddingCache::disabled())
}

/// Pipeline with the real reducer and HDBSCAN.
pub fn hdbscan_pipeline(config: &Config) -> ClusteringPipeline {
    ClusteringPipeline::new(topic_embedder(), config)
}

/// Pipeline whose clusters are exactly the topic groups.
pub fn linked_pipeline(config: &Config) -> ClusteringPipeline {
    ClusteringPipeline::new(topic_embedder(), config)
        .with_clusterer(Arc::new(LinkClusterer { radius: 0.5 }))
}

pub fn unavailable_pipeline(config: &Config) -> ClusteringPipeline {
    let embedder = CachedEmbedder::new(Arc::new(UnavailableEmbedder), EmbeddingCache::disabled());
    ClusteringPipeline::new(embedder, config)
}

/// Forty keywords across four topics with distinct volumes.
pub fn topic_keywords() -> Vec<KeywordInput> {
    let stems = [
        ("giá vàng", ["hôm nay", "sjc", "9999", "online", "mới nhất", "thế giới", "pnj", "nhẫn", "miếng", "tây"]),
        ("laptop", ["gaming", "văn phòng", "cũ", "sinh viên", "dell", "hp", "asus", "mỏng nhẹ", "giá rẻ", "trả góp"]),
        ("thời tiết", ["hà nội", "sài gòn", "đà nẵng", "ngày mai", "cuối tuần", "huế", "cần thơ", "hải phòng", "nha trang", "đà lạt"]),
        ("du lịch", ["phú quốc", "sapa", "hạ long", "hội an", "côn đảo", "mùa hè", "tết", "tự túc", "giá rẻ", "bụi"]),
    ];

    let mut keywords = Vec::new();
    for (t, (stem, tails)) in stems.iter().enumerate() {
        for (i, tail) in tails.iter().enumerate() {
            let volume = (1000 - t * 100 - i * 7) as u64;
            keywords.push(KeywordInput::new(format!("{} {}", stem, tail), volume));
        }
    }
    keywords
}
