//! Indexing and search orchestration.
//!
//! [`RetrievalService`] ties the collaborators together:
//!
//! ```text
//! index_folder:  DocumentWalker → TextExtractor → FolderHierarchy → EmbeddingProvider → RetrievalStore
//! search:        FilterSpec::compile → EmbeddingProvider → RetrievalStore::search → SearchResult
//! ```
//!
//! Indexing extracts and embeds up to `max_workers` files at once while a
//! single loop performs the inserts, then flushes the store once at the end.
//! A file that fails to extract, embed or validate, or exceeds the per-file
//! timeout, is reported as a [`SkippedFile`] and never stops the run. Store
//! failures do.

use super::extract::TextExtractor;
use super::filter::FilterSpec;
use super::hierarchy::FolderHierarchy;
use super::walker::{DiscoveredFile, DocumentWalker};
use crate::config::DEFAULT_MAX_CONTENT_BYTES;
use crate::error::{RetrievalError, Result};
use crate::storage::{DocumentId, DocumentRecord, RetrievalStore};
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use treescope_embed::EmbeddingProvider;

/// Tuning for [`RetrievalService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingConfig {
    /// Files extracted and embedded concurrently
    pub max_workers: usize,
    /// Budget for extracting and embedding one file
    pub file_timeout: Duration,
    /// Content beyond this many bytes is cut off before storage
    pub max_content_bytes: usize,
    /// Characters of content copied into [`SearchResult::preview`]
    pub preview_chars: usize,
    /// Extensions the walker picks up, without the dot
    pub supported_extensions: Vec<String>,
    /// Skip paths matched by `.gitignore`/`.ignore` files
    pub respect_ignore_files: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            file_timeout: Duration::from_secs(60),
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            preview_chars: 200,
            supported_extensions: ["txt", "md", "pdf", "doc", "docx"]
                .into_iter()
                .map(String::from)
                .collect(),
            respect_ignore_files: false,
        }
    }
}

impl IndexingConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_file_timeout(mut self, timeout: Duration) -> Self {
        self.file_timeout = timeout;
        self
    }

    pub fn with_max_content_bytes(mut self, max_content_bytes: usize) -> Self {
        self.max_content_bytes = max_content_bytes;
        self
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn with_supported_extensions(mut self, extensions: Vec<String>) -> Self {
        self.supported_extensions = extensions;
        self
    }

    pub fn with_respect_ignore_files(mut self, respect: bool) -> Self {
        self.respect_ignore_files = respect;
        self
    }
}

/// A file left out of the index and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of [`RetrievalService::index_folder`].
#[derive(Debug, Clone, Serialize)]
pub struct IndexingSummary {
    pub indexed: usize,
    pub skipped: Vec<SkippedFile>,
    pub elapsed: Duration,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: DocumentId,
    /// Path relative to the indexed root, `/`-separated
    pub path: String,
    pub similarity: f32,
    pub preview: String,
    pub content: String,
    pub hierarchy: FolderHierarchy,
}

/// Progress callbacks for an indexing run.
pub trait IndexingObserver: Send + Sync {
    fn on_file_indexed(&self, _path: &Path, _id: DocumentId) {}

    fn on_file_skipped(&self, _skipped: &SkippedFile) {}

    fn on_complete(&self, _summary: &IndexingSummary) {}
}

/// Reports progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl IndexingObserver for LoggingObserver {
    fn on_file_indexed(&self, path: &Path, id: DocumentId) {
        debug!("Indexed {} as document {}", path.display(), id);
    }

    fn on_file_skipped(&self, skipped: &SkippedFile) {
        warn!("Skipping {}: {}", skipped.path.display(), skipped.reason);
    }

    fn on_complete(&self, summary: &IndexingSummary) {
        info!(
            "Indexed {} files in {:.2?} ({} skipped)",
            summary.indexed,
            summary.elapsed,
            summary.skipped.len()
        );
    }
}

pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn RetrievalStore>,
    extractor: Arc<dyn TextExtractor>,
    config: IndexingConfig,
    observer: Arc<dyn IndexingObserver>,
}

impl RetrievalService {
    /// Wire up the collaborators. The embedder and the store must agree on
    /// the embedding dimension.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn RetrievalStore>,
        extractor: Arc<dyn TextExtractor>,
        config: IndexingConfig,
    ) -> Result<Self> {
        if embedder.embedding_dimension() != store.embedding_dimension() {
            return Err(RetrievalError::configuration(format!(
                "embedder {} produces {}-dimension vectors but the store expects {}",
                embedder.model_name(),
                embedder.embedding_dimension(),
                store.embedding_dimension()
            )));
        }

        Ok(Self {
            embedder,
            store,
            extractor,
            config,
            observer: Arc::new(LoggingObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn IndexingObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RetrievalStore> {
        &self.store
    }

    /// Index every supported file under `root`.
    ///
    /// Re-indexing the same folder adds a second copy of each document.
    pub async fn index_folder(&self, root: &Path) -> Result<IndexingSummary> {
        let metadata = tokio::fs::metadata(root).await.map_err(|e| {
            RetrievalError::configuration(format!(
                "index root {} is not accessible: {e}",
                root.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(RetrievalError::configuration(format!(
                "index root {} is not a directory",
                root.display()
            )));
        }

        info!("Starting to index folder: {}", root.display());
        let started = Instant::now();

        let walker = if self.config.respect_ignore_files {
            DocumentWalker::respecting_ignore_files(root, &self.config.supported_extensions)
        } else {
            DocumentWalker::new(root, &self.config.supported_extensions)
        };

        // Ordered output keeps ids in walk order; work still overlaps.
        let mut outcomes = futures::stream::iter(walker)
            .map(|discovered| self.prepare_with_timeout(discovered, root))
            .buffered(self.config.max_workers.max(1));

        let mut indexed = 0;
        let mut skipped = Vec::new();
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok((path, record)) => {
                    let id = self.store.insert(record).await?;
                    indexed += 1;
                    self.observer.on_file_indexed(&path, id);
                }
                Err(skip) => {
                    self.observer.on_file_skipped(&skip);
                    skipped.push(skip);
                }
            }
        }
        drop(outcomes);

        self.store.flush().await?;

        let summary = IndexingSummary {
            indexed,
            skipped,
            elapsed: started.elapsed(),
        };
        self.observer.on_complete(&summary);
        Ok(summary)
    }

    async fn prepare_with_timeout(
        &self,
        discovered: Result<DiscoveredFile>,
        root: &Path,
    ) -> std::result::Result<(PathBuf, DocumentRecord), SkippedFile> {
        let file = match discovered {
            Ok(file) => file,
            Err(err) => return Err(skipped_from_error(root, err)),
        };

        match tokio::time::timeout(self.config.file_timeout, self.prepare(&file, root)).await {
            Ok(Ok(record)) => Ok((file.path, record)),
            Ok(Err(err)) => Err(SkippedFile {
                path: file.path,
                reason: err.to_string(),
            }),
            Err(_) => Err(SkippedFile {
                path: file.path,
                reason: format!("timed out after {:?}", self.config.file_timeout),
            }),
        }
    }

    async fn prepare(&self, file: &DiscoveredFile, root: &Path) -> Result<DocumentRecord> {
        if !self.extractor.supports(&file.path) {
            return Err(RetrievalError::extraction(
                &file.path,
                "unsupported document format",
            ));
        }

        let hierarchy = FolderHierarchy::extract(&file.path, root)?;
        let extracted = self.extractor.extract(&file.path).await?;
        let content = truncate_content(extracted.text, self.config.max_content_bytes, &file.path);
        let embedding = self.embedder.embed_text(&content).await?;

        let record = DocumentRecord {
            content,
            embedding,
            hierarchy,
            mime_type: extracted.mime_type,
            file_size: file.size,
        };
        record.validate(self.store.embedding_dimension())?;

        debug!("Prepared {}", record.hierarchy.full_path);
        Ok(record)
    }

    /// Rank indexed documents against `query`, restricted by `filter`.
    ///
    /// Documents from an index run that has not yet flushed may be missing.
    pub async fn search(
        &self,
        query: &str,
        filter: &FilterSpec,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let compiled = filter.compile()?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for {:?} where {}", query, compiled);
        let embedding = self.embedder.embed_text(query).await?;
        let hits = self.store.search(&embedding, &compiled, limit).await?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                id: hit.id,
                path: hit.hierarchy.full_path.clone(),
                similarity: hit.score,
                preview: hit.content.chars().take(self.config.preview_chars).collect(),
                content: hit.content,
                hierarchy: hit.hierarchy,
            })
            .collect())
    }

    /// [`search`](Self::search) with a filter in its JSON dictionary form.
    pub async fn search_json(
        &self,
        query: &str,
        filter: &serde_json::Value,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let filter = FilterSpec::from_json(filter)?;
        self.search(query, &filter, limit).await
    }
}

fn skipped_from_error(root: &Path, err: RetrievalError) -> SkippedFile {
    match err {
        RetrievalError::Extraction { path, message } => SkippedFile {
            path,
            reason: message,
        },
        other => SkippedFile {
            path: root.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// Cut `text` to at most `max_bytes`, backing off to a char boundary.
fn truncate_content(mut text: String, max_bytes: usize, path: &Path) -> String {
    if text.len() <= max_bytes {
        return text;
    }

    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    warn!(
        "Truncating {} from {} to {} bytes",
        path.display(),
        text.len(),
        end
    );
    text.truncate(end);
    text
}
