//! Text extraction from document files.

use crate::error::{RetrievalError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Text pulled out of a document, ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub mime_type: String,
}

/// Converts a document file into plain text.
///
/// Failures are per-file: the indexer records them and moves on.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor understands the file's format.
    fn supports(&self, path: &Path) -> bool;

    async fn extract(&self, path: &Path) -> Result<ExtractedText>;
}

/// Reads UTF-8 text and markdown files as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn mime_type(path: &Path) -> Option<&'static str> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" | "text" => Some("text/plain"),
            "md" | "markdown" => Some("text/markdown"),
            _ => None,
        }
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        Self::mime_type(path).is_some()
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedText> {
        let mime_type = Self::mime_type(path).ok_or_else(|| {
            RetrievalError::extraction(path, "unsupported document format")
        })?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RetrievalError::extraction(path, e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| RetrievalError::extraction(path, format!("not valid UTF-8: {e}")))?;

        Ok(ExtractedText {
            text,
            mime_type: mime_type.to_string(),
        })
    }
}
