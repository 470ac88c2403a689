//! Vector helpers shared by the clustering stages.

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Mean of a set of vectors. Empty input gives an empty vector.
pub fn compute_centroid<'a>(vectors: impl IntoIterator<Item = &'a [f32]>) -> Vec<f32> {
    let mut centroid: Vec<f32> = Vec::new();
    let mut count = 0usize;

    for vector in vectors {
        if centroid.is_empty() {
            centroid = vec![0.0; vector.len()];
        }
        for (c, v) in centroid.iter_mut().zip(vector.iter()) {
            *c += *v;
        }
        count += 1;
    }

    if count > 0 {
        let n = count as f32;
        for c in &mut centroid {
            *c /= n;
        }
    }
    centroid
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Similarity as a 0 to 100 matching point, one decimal.
pub fn to_matching_point(similarity: f64) -> f64 {
    round1(similarity * 100.0)
}
