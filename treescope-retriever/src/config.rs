//! File-backed settings for the `treescope` binary and library users.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```toml
//! database_path = "index/docs.db"
//! max_workers = 8
//! supported_extensions = ["txt", "md"]
//! ```

use crate::error::{RetrievalError, Result};
use crate::retrieval::service::IndexingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use treescope_embed::EmbedConfig;

/// Default limit on stored content, the historical VARCHAR bound of the index.
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// SQLite database file holding the index
    pub database_path: PathBuf,
    /// Embedding model name, see `treescope_embed::KNOWN_MODELS`
    pub model_name: String,
    /// Where downloaded model files are cached
    pub model_cache_dir: PathBuf,
    /// Files extracted and embedded concurrently while indexing
    pub max_workers: usize,
    /// Per-file budget for extraction plus embedding
    pub file_timeout_secs: u64,
    /// Longer document text is truncated to this many bytes
    pub max_content_bytes: usize,
    /// Buffered inserts committed per transaction
    pub write_batch_size: usize,
    /// Characters of content shown as a result preview
    pub preview_chars: usize,
    /// Result count when a search does not specify one
    pub default_limit: usize,
    /// File extensions (without the dot) picked up by the walker
    pub supported_extensions: Vec<String>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        let embed = EmbedConfig::default();
        Self {
            database_path: PathBuf::from(".treescope.db"),
            model_name: embed.model_name,
            model_cache_dir: embed.cache_dir,
            max_workers: 4,
            file_timeout_secs: 60,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            write_batch_size: 64,
            preview_chars: 200,
            default_limit: 5,
            supported_extensions: ["txt", "md", "pdf", "doc", "docx"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl RetrieverConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| RetrievalError::configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(RetrievalError::configuration("max_workers must be at least 1"));
        }
        if self.write_batch_size == 0 {
            return Err(RetrievalError::configuration(
                "write_batch_size must be at least 1",
            ));
        }
        if self.max_content_bytes == 0 {
            return Err(RetrievalError::configuration(
                "max_content_bytes must be at least 1",
            ));
        }
        if self.file_timeout_secs == 0 {
            return Err(RetrievalError::configuration(
                "file_timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_write_batch_size(mut self, write_batch_size: usize) -> Self {
        self.write_batch_size = write_batch_size;
        self
    }

    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }

    /// Settings for the embedding provider
    pub fn embed_config(&self) -> EmbedConfig {
        EmbedConfig::new(self.model_name.clone()).with_cache_dir(self.model_cache_dir.clone())
    }

    /// Settings for `RetrievalService`
    pub fn indexing_config(&self) -> IndexingConfig {
        IndexingConfig::default()
            .with_max_workers(self.max_workers)
            .with_file_timeout(self.file_timeout())
            .with_max_content_bytes(self.max_content_bytes)
            .with_preview_chars(self.preview_chars)
            .with_supported_extensions(self.supported_extensions.clone())
    }
}
