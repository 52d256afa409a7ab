//! Deterministic feature-hashing embedder.
//!
//! Maps words and their character trigrams into a fixed number of buckets,
//! weights them by term frequency, and L2-normalizes the result. Texts that
//! share vocabulary land close together; texts with no words in common are
//! near-orthogonal. No model, no network, no state.

use std::collections::{BTreeMap, HashSet};

use super::{check_provider_output, ensure_embeddable, EmbeddingService};
use crate::error::Result;
use crate::types::Embedding;
use crate::vector::l2_normalize;

/// Words carrying no topical signal.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "do", "does", "how", "what", "into",
];

/// Local embedder for development, tests, and offline deployments.
///
/// # Example
///
/// ```rust
/// use lessonindex::embedding::{EmbeddingService, HashingEmbedding};
///
/// let service = HashingEmbedding::new(128);
/// let a = service.embed("cell respiration").unwrap();
/// let b = service.embed("cell respiration").unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Debug)]
pub struct HashingEmbedding {
    dimension: usize,
    stop_words: HashSet<&'static str>,
}

impl HashingEmbedding {
    /// Creates an embedder producing vectors of `dimension` floats.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    fn bucket(&self, hash: u64) -> usize {
        (hash % self.dimension as u64) as usize
    }

    fn generate(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return embedding;
        }

        let lower = text.to_lowercase();
        let words = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !self.stop_words.contains(w));

        // BTreeMap keeps accumulation order stable across runs.
        let mut frequencies: BTreeMap<&str, u32> = BTreeMap::new();
        for word in words {
            *frequencies.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &frequencies {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let hash = window
                    .iter()
                    .fold(0u64, |acc, c| acc.wrapping_mul(37).wrapping_add(*c as u64));
                let idx = self.bucket(hash);
                embedding[idx] += (*freq as f32).sqrt();
            }

            let hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            let idx = self.bucket(hash);
            embedding[idx] += *freq as f32;
        }

        // Only stop words or very short tokens: hash the raw text so the
        // vector is still non-zero and deterministic.
        if embedding.iter().all(|v| *v == 0.0) {
            let hash = lower
                .trim()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            let idx = self.bucket(hash);
            embedding[idx] = 1.0;
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

impl EmbeddingService for HashingEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        ensure_embeddable(text)?;
        let embedding = self.generate(text);
        check_provider_output(&embedding, self.dimension)?;
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
