//! Error taxonomy for indexing and retrieval

use std::path::PathBuf;
use treescope_embed::EmbedError;

pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors raised by the retrieval layer.
///
/// While indexing, any error raised while preparing a single file is
/// recorded against that file and the walk continues. Store errors abort.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Text or hierarchy metadata could not be derived for one file
    #[error("Failed to extract {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    /// Dimension or model mismatch, missing root folder, bad settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The folder filter could not be turned into a predicate
    #[error("Invalid filter: {0}")]
    FilterCompile(String),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Stored data does not decode into a valid record
    #[error("Corrupt index data: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrievalError {
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn filter(message: impl Into<String>) -> Self {
        Self::FilterCompile(message.into())
    }
}
