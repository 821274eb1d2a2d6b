//! Hash-seeded deterministic encoder: the always-available default.
//!
//! Produces an L2-normalized pseudo-random vector seeded by the input
//! text's hash, so the same text always encodes to the same vector and
//! different texts encode to (with overwhelming probability) different
//! vectors. It carries no semantic relationship between texts beyond
//! exact-match identity — useful for exercising the cache and gateway
//! without a model directory, not for real paraphrase recall.

use super::{EmbeddingError, LazyBackend};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Hash-seeded deterministic encoder.
pub struct DeterministicEncoder {
    dim: usize,
}

impl DeterministicEncoder {
    /// Builds an encoder producing `dim`-wide vectors.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl LazyBackend for DeterministicEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dim);
        for _ in 0..self.dim {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let value = ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
            embedding.push(value);
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let encoder = DeterministicEncoder::new(32);
        assert_eq!(
            encoder.encode("please remove user profile").unwrap(),
            encoder.encode("please remove user profile").unwrap()
        );
    }

    #[test]
    fn differs_across_distinct_text() {
        let encoder = DeterministicEncoder::new(32);
        assert_ne!(
            encoder.encode("hello").unwrap(),
            encoder.encode("goodbye").unwrap()
        );
    }

    #[test]
    fn produces_the_configured_width() {
        let encoder = DeterministicEncoder::new(384);
        assert_eq!(encoder.encode("x").unwrap().len(), 384);
    }

    #[test]
    fn is_l2_normalized() {
        let encoder = DeterministicEncoder::new(64);
        let v = encoder.encode("normalize me").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn handles_empty_text() {
        let encoder = DeterministicEncoder::new(16);
        assert_eq!(encoder.encode("").unwrap().len(), 16);
    }
}
