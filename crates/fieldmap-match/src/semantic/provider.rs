//! The embedding provider capability and vector math.

use crate::error::ProviderError;

/// A text embedding service.
///
/// Implementations must return vectors of the same length for every text
/// they encode under one `model_id`.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifies the model; part of every cached vector's key.
    fn model_id(&self) -> &str;

    fn encode(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Encode several texts, in order.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        texts.iter().map(|text| self.encode(text)).collect()
    }
}

/// Cosine similarity clamped to `[0, 1]`.
///
/// Zero-length vectors, mismatched dimensions and non-finite results give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    if cosine.is_finite() {
        (cosine as f32).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Scale a vector to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
