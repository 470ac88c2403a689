//! Hybrid semantic and lexical feature vectors.
//!
//! Each keyword gets its dense embedding concatenated with a TF-IDF row
//! built from the raw input texts. Both halves are unit length before
//! weighting and the combined row is unit length again, so cosine
//! similarity between two rows is a plain dot product.
//!
//! The lexical half is kept sparse (sorted `(column, value)` pairs); the
//! vocabulary of a large batch easily reaches six figures.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{Analyzer, FeatureConfig};
use crate::embedding::l2_normalize;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("Invalid regex"));

static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\s+").expect("Invalid regex"));

/// Row-major feature matrix with a dense and a sparse block.
#[derive(Debug, Clone, Default)]
pub struct HybridFeatures {
    dense: Vec<Vec<f32>>,
    sparse: Vec<Vec<(usize, f32)>>,
    lexical_dim: usize,
}

impl HybridFeatures {
    /// Build hybrid rows from dense embeddings and the raw keyword texts.
    pub fn build(embeddings: &[Vec<f32>], texts: &[String], config: &FeatureConfig) -> Self {
        let tfidf = TfIdf::fit(texts, config);

        let mut dense = Vec::with_capacity(embeddings.len());
        let mut sparse = Vec::with_capacity(embeddings.len());

        for (embedding, row) in embeddings.iter().zip(tfidf.rows) {
            let mut semantic = embedding.clone();
            l2_normalize(&mut semantic);
            semantic.iter_mut().for_each(|x| *x *= config.semantic_weight);

            let lexical: Vec<(usize, f32)> = row
                .into_iter()
                .map(|(col, v)| (col, v * config.lexical_weight))
                .collect();

            let norm = (semantic.iter().map(|x| x * x).sum::<f32>()
                + lexical.iter().map(|(_, v)| v * v).sum::<f32>())
            .sqrt();

            if norm > 0.0 {
                semantic.iter_mut().for_each(|x| *x /= norm);
                dense.push(semantic);
                sparse.push(lexical.into_iter().map(|(c, v)| (c, v / norm)).collect());
            } else {
                dense.push(semantic);
                sparse.push(lexical);
            }
        }

        Self {
            dense,
            sparse,
            lexical_dim: tfidf.vocabulary_size,
        }
    }

    /// Dense-only rows (used when lexical features are skipped).
    pub fn dense_only(embeddings: &[Vec<f32>]) -> Self {
        let dense = embeddings
            .iter()
            .map(|e| {
                let mut row = e.clone();
                l2_normalize(&mut row);
                row
            })
            .collect::<Vec<_>>();
        let sparse = vec![Vec::new(); dense.len()];
        Self {
            dense,
            sparse,
            lexical_dim: 0,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Total column count (dense width plus vocabulary size).
    pub fn dimension(&self) -> usize {
        self.dense.first().map(|r| r.len()).unwrap_or(0) + self.lexical_dim
    }

    /// Dot product of rows `i` and `j`.
    pub fn dot(&self, i: usize, j: usize) -> f32 {
        let dense: f32 = self.dense[i]
            .iter()
            .zip(self.dense[j].iter())
            .map(|(a, b)| a * b)
            .sum();
        dense + sparse_dot(&self.sparse[i], &self.sparse[j])
    }

    /// Cosine distance between rows `i` and `j`, floored at zero.
    pub fn distance(&self, i: usize, j: usize) -> f32 {
        (1.0 - self.dot(i, j)).max(0.0)
    }
}

fn sparse_dot(a: &[(usize, f32)], b: &[(usize, f32)]) -> f32 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// TF-IDF rows with smoothed idf and unit-length rows.
struct TfIdf {
    rows: Vec<Vec<(usize, f32)>>,
    vocabulary_size: usize,
}

impl TfIdf {
    fn fit(texts: &[String], config: &FeatureConfig) -> Self {
        let documents: Vec<Vec<String>> = texts
            .iter()
            .map(|t| analyze(t, config.analyzer, config.ngram_min, config.ngram_max))
            .collect();

        // Sorted vocabulary keeps column order stable across runs.
        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for terms in &documents {
            let unique: HashSet<&str> = terms.iter().map(|s| s.as_str()).collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let columns: HashMap<&str, usize> = doc_freq
            .keys()
            .enumerate()
            .map(|(col, term)| (*term, col))
            .collect();

        let n = texts.len() as f32;
        let idf: Vec<f32> = doc_freq
            .values()
            .map(|&df| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        let rows = documents
            .iter()
            .map(|terms| {
                let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
                for term in terms {
                    if let Some(&col) = columns.get(term.as_str()) {
                        *counts.entry(col).or_insert(0.0) += 1.0;
                    }
                }
                let mut row: Vec<(usize, f32)> = counts
                    .into_iter()
                    .map(|(col, tf)| (col, tf * idf[col]))
                    .collect();
                let norm = row.iter().map(|(_, v)| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    row.iter_mut().for_each(|(_, v)| *v /= norm);
                }
                row
            })
            .collect();

        Self {
            rows,
            vocabulary_size: columns.len(),
        }
    }
}

/// Split text into the n-gram terms counted by the lexical half.
fn analyze(text: &str, analyzer: Analyzer, ngram_min: usize, ngram_max: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    match analyzer {
        Analyzer::Word => {
            let tokens: Vec<&str> = TOKEN_PATTERN.find_iter(&lowered).map(|m| m.as_str()).collect();
            let mut terms = Vec::new();
            for n in ngram_min..=ngram_max {
                if n == 0 || n > tokens.len() {
                    continue;
                }
                terms.extend(tokens.windows(n).map(|w| w.join(" ")));
            }
            terms
        }
        Analyzer::Char => {
            let collapsed = WHITESPACE_PATTERN.replace_all(&lowered, " ");
            let chars: Vec<char> = collapsed.chars().collect();
            let mut terms = Vec::new();
            for n in ngram_min..=ngram_max {
                if n == 0 || n > chars.len() {
                    continue;
                }
                terms.extend(chars.windows(n).map(|w| w.iter().collect::<String>()));
            }
            terms
        }
    }
}
