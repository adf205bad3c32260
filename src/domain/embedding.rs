use serde::{Deserialize, Serialize};

/// A face embedding produced by the network: fixed length, unit L2 norm.
///
/// Embeddings are only comparable when produced by the same weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }
}

/// Cosine similarity in [-1, 1]; 1 means identical direction.
/// Returns 0.0 when either vector has zero length.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f32 {
    let mut dot    = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.values.iter().zip(b.values.iter()) {
        dot    += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        (dot / denom).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Euclidean distance; bounded by 2 for unit-norm embeddings.
pub fn euclidean_distance(a: &Embedding, b: &Embedding) -> f32 {
    a.values
        .iter()
        .zip(b.values.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}
