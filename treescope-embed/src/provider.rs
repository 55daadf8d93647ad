//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use half::f16;
use std::sync::{Arc, Mutex};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f16>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of f16 embeddings.
    ///
    /// The dimension is inferred from the first embedding vector, or 0 if
    /// there are none.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text.
///
/// A provider produces vectors of one fixed dimension for its whole lifetime.
/// Stores that rank by inner product rely on [`is_normalized`] to know whether
/// scores are cosine similarities.
///
/// [`is_normalized`]: EmbeddingProvider::is_normalized
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>>;

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Name of the model behind this provider
    fn model_name(&self) -> &str;

    /// Whether produced vectors have unit length
    fn is_normalized(&self) -> bool;
}

/// Convert an f32 vector to f16, optionally scaling it to unit length first.
pub fn to_f16_vector(embedding: Vec<f32>, normalize: bool) -> Vec<f16> {
    let norm = if normalize {
        embedding.iter().map(|x| x * x).sum::<f32>().sqrt()
    } else {
        0.0
    };

    if norm > 0.0 {
        embedding.into_iter().map(|x| f16::from_f32(x / norm)).collect()
    } else {
        embedding.into_iter().map(f16::from_f32).collect()
    }
}

/// Map a configured model name onto the fastembed model enum
fn resolve_model(name: &str) -> Result<EmbeddingModel> {
    match name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "snowflake-arctic-embed-xs" => Ok(EmbeddingModel::SnowflakeArcticEmbedXS),
        other => Err(EmbedError::invalid_config(format!(
            "model '{other}' is not available in the local ONNX backend"
        ))),
    }
}

/// FastEmbed-based embedding provider using local ONNX models
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<TextEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a new uninitialized provider. Call [`initialize`](Self::initialize)
    /// before generating embeddings, or use [`create`](Self::create).
    pub fn new(config: EmbedConfig) -> Self {
        let dimension = config.expected_dimension().unwrap_or(384);
        Self {
            config,
            model: None,
            dimension,
        }
    }

    /// Downloads (on first use) and loads the embedding model.
    pub async fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        tracing::info!(
            "Initializing FastEmbed provider for model: {}",
            self.config.model_name()
        );

        let model_kind = resolve_model(self.config.model_name())?;
        let cache_dir = self.config.cache_dir.clone();
        let show_progress = self.config.show_download_progress;
        let model_name = self.config.model_name().to_string();

        tokio::fs::create_dir_all(&cache_dir).await?;

        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                tracing::info!("Loading embedding model: {}", model_name);

                let init_options = InitOptions::new(model_kind)
                    .with_cache_dir(cache_dir)
                    .with_show_download_progress(show_progress);

                let mut model =
                    TextEmbedding::try_new(init_options).map_err(EmbedError::model_init)?;

                // Probe the real output size rather than trusting the table
                let probe = model
                    .embed(vec!["dimension probe".to_string()], None)
                    .map_err(EmbedError::model_init)?;
                let dimension = probe.first().map(|emb| emb.len()).unwrap_or(0);

                tracing::info!("Model loaded successfully. Dimension: {}", dimension);
                Ok((model, dimension))
            })
            .await??;

        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "Model validation failed: empty embedding",
            ));
        }
        if let Some(expected) = self.config.expected_dimension() {
            if expected != dimension {
                return Err(EmbedError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }
        }

        self.model = Some(Arc::new(Mutex::new(model)));
        self.dimension = dimension;
        Ok(())
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    /// The configuration this provider was built from
    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let texts = vec![text.to_string()];
        let result = self.embed_texts(&texts).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("No embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            let chunk = chunk.to_vec();
            let model_clone = Arc::clone(model);

            let batch_embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                let mut model_guard = model_clone
                    .lock()
                    .map_err(|_| EmbedError::invalid_config("embedding model lock poisoned"))?;
                model_guard
                    .embed(chunk, None)
                    .map_err(EmbedError::embedding_gen)
            })
            .await??;

            for embedding in batch_embeddings {
                if embedding.len() != self.dimension {
                    return Err(EmbedError::DimensionMismatch {
                        expected: self.dimension,
                        actual: embedding.len(),
                    });
                }
                all_embeddings.push(to_f16_vector(embedding, self.config.normalize));
            }
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }

    fn model_name(&self) -> &str {
        self.config.model_name()
    }

    fn is_normalized(&self) -> bool {
        self.config.normalize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_result() {
        let embeddings = vec![
            vec![f16::from_f32(0.1), f16::from_f32(0.2), f16::from_f32(0.3)],
            vec![f16::from_f32(0.4), f16::from_f32(0.5), f16::from_f32(0.6)],
        ];
        let result = EmbeddingResult::new(embeddings);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());
        assert_eq!(EmbeddingResult::new(vec![]).dimension, 0);
    }

    #[test]
    fn test_to_f16_vector_normalizes() {
        let v = to_f16_vector(vec![3.0, 4.0], true);
        assert!((v[0].to_f32() - 0.6).abs() < 1e-3);
        assert!((v[1].to_f32() - 0.8).abs() < 1e-3);

        let raw = to_f16_vector(vec![3.0, 4.0], false);
        assert_eq!(raw, vec![f16::from_f32(3.0), f16::from_f32(4.0)]);

        // Zero vectors are left alone instead of dividing by zero
        let zero = to_f16_vector(vec![0.0, 0.0], true);
        assert!(zero.iter().all(|x| x.to_f32() == 0.0));
    }

    #[test]
    fn test_fastembed_provider_creation() {
        let provider = FastEmbedProvider::new(EmbedConfig::default());

        assert_eq!(provider.provider_name(), "fastembed");
        assert_eq!(provider.model_name(), "all-MiniLM-L6-v2");
        assert_eq!(provider.embedding_dimension(), 384);
        assert!(provider.is_normalized());
    }

    #[test]
    fn test_resolve_model() {
        assert!(resolve_model("all-MiniLM-L6-v2").is_ok());
        assert!(resolve_model("BGE-SMALL-EN-V1.5").is_ok());
        assert!(resolve_model("gpt-embeddings").is_err());
    }

    #[tokio::test]
    async fn test_uninitialized_provider_errors() {
        let provider = FastEmbedProvider::new(EmbedConfig::default());
        let err = provider.embed_text("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));

        // Empty batches never touch the model
        let empty = provider.embed_texts(&[]).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    #[ignore] // Downloads the real model - run with: cargo test -p treescope-embed -- --ignored
    async fn test_minilm_download_and_embedding() -> Result<()> {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();

        let temp_dir = tempfile::tempdir()?;
        let config = EmbedConfig::default_with_path(temp_dir.path());
        let provider = FastEmbedProvider::create(config).await?;
        assert_eq!(provider.embedding_dimension(), 384);

        let texts = vec![
            "Quarterly revenue grew in the northern region.".to_string(),
            "Sales figures for the north increased this quarter.".to_string(),
            "The cat slept on the windowsill.".to_string(),
        ];
        let result = provider.embed_texts(&texts).await?;
        assert_eq!(result.len(), 3);
        assert_eq!(result.dimension, 384);

        let dot = |a: &[f16], b: &[f16]| -> f32 {
            a.iter().zip(b).map(|(x, y)| x.to_f32() * y.to_f32()).sum()
        };
        let related = dot(&result.embeddings[0], &result.embeddings[1]);
        let unrelated = dot(&result.embeddings[0], &result.embeddings[2]);
        assert!(
            related > unrelated,
            "related texts should score higher: {related} vs {unrelated}"
        );

        Ok(())
    }
}
