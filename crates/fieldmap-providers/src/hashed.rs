//! Offline embedding provider based on hashed character n-grams.
//!
//! Needs no network and no model files. It captures spelling overlap and
//! shared words, not meaning, so it works as a stand-in when no embedding
//! service is configured.

use fieldmap_match::ProviderError;
use fieldmap_match::semantic::{EmbeddingProvider, l2_normalize};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Default vector length.
pub const DEFAULT_DIMENSIONS: usize = 256;

/// Hashes every word and every character trigram of a text into a fixed
/// number of buckets, then scales the result to unit length.
#[derive(Debug, Clone)]
pub struct HashedNgramEncoder {
    dimensions: usize,
    model_id: String,
}

impl HashedNgramEncoder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_id: format!("hashed-ngram-{dimensions}"),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn bucket(&self, feature: &str) -> usize {
        let hash = feature.bytes().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        });
        (hash % self.dimensions as u64) as usize
    }
}

impl Default for HashedNgramEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl EmbeddingProvider for HashedNgramEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let lowered = text.to_lowercase();
        for word in lowered
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(word)] += 1.0;
            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                vector[self.bucket(&gram)] += 0.5;
            }
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}
