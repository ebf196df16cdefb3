//! Deterministic local embeddings via feature hashing.
//!
//! [`HashingEmbedder`] needs no model files and no network: each lower-cased
//! word and each character trigram of the word is hashed into a bucket of a
//! fixed-size vector, which is then L2-normalised. Words that share a stem
//! ("terminate", "termination") share most of their trigrams, so related
//! wording still scores well. Useful for offline indexing, demos and tests.
//!
//! Stop words are ignored unless the text has nothing else; text with no
//! words at all hashes a fixed marker token, so every vector is unit-norm.

use async_trait::async_trait;

use crate::embedding::{EmbeddingProvider, normalize};
use crate::error::{RagError, Result};

/// Default dimensionality, matching common sentence-embedding models.
pub const DEFAULT_DIMENSIONS: usize = 384;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Hashed in place of text that has no words.
const EMPTY_MARKER: &str = "#";

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "does", "for", "from", "how", "in", "is",
    "it", "of", "on", "or", "the", "this", "to", "was", "what", "when", "which", "who", "with",
];

/// An [`EmbeddingProvider`] based on the hashing trick.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    name: String,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of length `dimensions`.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, name: format!("hashing-{dimensions}") }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let words: Vec<&str> =
            lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
        let mut content: Vec<&str> =
            words.iter().copied().filter(|w| !STOP_WORDS.contains(w)).collect();
        if content.is_empty() {
            content = words;
        }
        if content.is_empty() {
            vector[self.bucket(EMPTY_MARKER.as_bytes())] = 1.0;
            return vector;
        }

        for word in content {
            vector[self.bucket(word.as_bytes())] += WORD_WEIGHT;

            let padded: Vec<char> = std::iter::once('#').chain(word.chars()).chain(['#']).collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(trigram.as_bytes())] += TRIGRAM_WEIGHT;
            }
        }
        normalize(&mut vector);
        vector
    }

    fn bucket(&self, bytes: &[u8]) -> usize {
        (fnv1a(bytes) % self.dimensions as u64) as usize
    }
}

/// 64-bit FNV-1a, stable across platforms and releases.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(RagError::Embedding {
                provider: self.name.clone(),
                message: "dimensions must be greater than zero".to_string(),
            });
        }
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}
