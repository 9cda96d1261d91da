//! Offline feature-hashing embedder

use std::hash::Hash;
use std::hash::Hasher;

use async_trait::async_trait;
use twox_hash::XxHash64;

use super::EmbeddingService;
use crate::errors::Result;
use crate::text::tokenize;

/// Deterministic bag-of-tokens embedding: each lower-cased token is hashed
/// into a bucket, then the vector is L2-normalized. Texts sharing tokens
/// land close together under cosine distance.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimension];
        for token in tokenize(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dimension as u64) as usize;
            let weight = 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += weight;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedder {
    fn model_name(&self) -> String {
        format!("hashing:{}", self.dimension)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}
