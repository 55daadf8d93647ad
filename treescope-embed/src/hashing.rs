//! Deterministic feature-hashing embedder.
//!
//! Needs no model files, so it backs offline runs and tests. Each lowercase
//! alphanumeric token is hashed with FNV-1a into one of `dimension` buckets
//! with a hash-derived sign. Texts sharing vocabulary land close together.

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, to_f16_vector};
use async_trait::async_trait;
use fnv::FnvHasher;
use half::f16;
use std::hash::Hasher;

/// Name reported through [`EmbeddingProvider::model_name`].
pub const HASHING_MODEL_NAME: &str = "fnv-feature-hash";

#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hashing embedder dimension must be at least 1",
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_sync(&self, text: &str) -> Vec<f16> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = FnvHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        to_f16_vector(vector, true)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let embeddings = texts.iter().map(|t| self.embed_sync(t)).collect();
        Ok(EmbeddingResult {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        HASHING_MODEL_NAME
    }

    fn is_normalized(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f16], b: &[f16]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x.to_f32() * y.to_f32()).sum()
    }

    #[tokio::test]
    async fn test_deterministic_and_normalized() {
        let provider = HashingEmbeddingProvider::new(64).unwrap();
        let a = provider.embed_text("quarterly sales report").await.unwrap();
        let b = provider.embed_text("Quarterly SALES report").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm = dot(&a, &a);
        assert!((norm - 1.0).abs() < 0.01, "norm was {norm}");
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let provider = HashingEmbeddingProvider::new(384).unwrap();
        let query = provider.embed_text("revenue forecast").await.unwrap();
        let related = provider
            .embed_text("the revenue forecast for next year")
            .await
            .unwrap();
        let unrelated = provider
            .embed_text("a cat sleeping in the sun")
            .await
            .unwrap();

        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = HashingEmbeddingProvider::new(8).unwrap();
        let v = provider.embed_text("  ...  ").await.unwrap();
        assert!(v.iter().all(|x| x.to_f32() == 0.0));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let provider = HashingEmbeddingProvider::new(32).unwrap();
        let texts = vec!["alpha beta".to_string(), "gamma".to_string()];
        let batch = provider.embed_texts(&texts).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.dimension, 32);
        assert_eq!(
            batch.embeddings[1],
            provider.embed_text("gamma").await.unwrap()
        );
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbeddingProvider::new(0).is_err());
    }
}
