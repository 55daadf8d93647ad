//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default model, matching the 384-dimension sentence-transformer the
/// document index was originally built around.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Models known to the local ONNX backend, with the dimension they produce.
pub const KNOWN_MODELS: &[(&str, usize)] = &[
    ("all-MiniLM-L6-v2", 384),
    ("all-MiniLM-L12-v2", 384),
    ("bge-small-en-v1.5", 384),
    ("bge-base-en-v1.5", 768),
    ("snowflake-arctic-embed-xs", 384),
];

/// Configuration for embedding models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    pub model_name: String,
    /// Directory where downloaded model files are cached
    pub cache_dir: PathBuf,
    /// Maximum batch size for embedding generation
    pub batch_size: usize,
    /// Whether to normalize embeddings to unit length
    pub normalize: bool,
    /// Show a progress bar while the model downloads
    pub show_download_progress: bool,
}

impl EmbedConfig {
    /// Create a configuration for the named model with default settings.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Create the default configuration rooted at a specific cache directory
    pub fn default_with_path<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self::default().with_cache_dir(cache_dir.as_ref())
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: Into<PathBuf>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..self
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Dimension the configured model is documented to produce, if known.
    pub fn expected_dimension(&self) -> Option<usize> {
        KNOWN_MODELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.model_name))
            .map(|(_, dim)| *dim)
    }

    /// Validate settings that do not require touching the model files.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::invalid_config("model name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch size must be at least 1"));
        }
        if self.expected_dimension().is_none() {
            return Err(EmbedError::invalid_config(format!(
                "unknown model '{}'; supported models: {}",
                self.model_name,
                KNOWN_MODELS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        tracing::debug!("Embedding config validated for: {}", self.model_name);
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: PathBuf::from(".treescope").join("models"),
            batch_size: 32,
            normalize: true,
            show_download_progress: false,
        }
    }
}
