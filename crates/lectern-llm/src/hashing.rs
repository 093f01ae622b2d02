//! In-process feature-hashing embedder.
//!
//! Each lowercase alphanumeric token is hashed with blake3 (keyed by the model id) into
//! one of `dimensions` buckets with a pseudo-random sign, and the result is
//! L2-normalized. Texts sharing vocabulary land close together under cosine
//! similarity. No network, no model weights, fully deterministic.

use crate::embed::{EmbedFuture, Embedder};

pub const DEFAULT_DIMENSIONS: usize = 384;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model_id: String,
    key: [u8; 32],
    dimensions: usize,
}

impl HashingEmbedder {
    #[must_use]
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        let model_id = model_id.into();
        let key = *blake3::hash(model_id.as_bytes()).as_bytes();
        Self {
            model_id,
            key,
            dimensions: dimensions.max(1),
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let hash = blake3::keyed_hash(&self.key, token.as_bytes());
            let bytes = hash.as_bytes();
            let mut idx = [0u8; 8];
            idx.copy_from_slice(&bytes[..8]);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (u64::from_le_bytes(idx) % self.dimensions as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalize(&mut vector);
        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        let vector = self.embed_sync(text);
        Box::pin(async move { Ok(vector) })
    }
}
