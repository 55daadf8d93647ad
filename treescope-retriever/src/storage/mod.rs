//! Storage abstraction for indexed documents.
//!
//! A [`RetrievalStore`] keeps one [`DocumentRecord`] per indexed file and
//! answers hybrid queries: an exact structural predicate from a
//! [`CompiledFilter`] combined with inner-product ranking against a query
//! embedding.
//!
//! ## Visibility
//!
//! Inserts may be buffered. A record becomes searchable once
//! [`RetrievalStore::flush`] has returned; before that a search may or may
//! not see it.
//!
//! ```text
//! insert ─► write buffer ─► flush ─► searchable
//! ```

use crate::error::{RetrievalError, Result};
use crate::retrieval::filter::CompiledFilter;
use crate::retrieval::hierarchy::FolderHierarchy;
use async_trait::async_trait;
use half::f16;
use serde::Serialize;

pub mod sqlite_store;

pub use sqlite_store::{EmbeddingModelMetadata, SqliteStore};

/// Store-assigned identifier, increasing in insertion order.
pub type DocumentId = i64;

/// One indexed document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub content: String,
    pub embedding: Vec<f16>,
    pub hierarchy: FolderHierarchy,
    pub mime_type: String,
    pub file_size: u64,
}

impl DocumentRecord {
    /// Check the embedding dimension and the hierarchy invariants.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if self.embedding.len() != dimension {
            return Err(RetrievalError::configuration(format!(
                "embedding for {} has dimension {}, store expects {}",
                self.hierarchy.full_path,
                self.embedding.len(),
                dimension
            )));
        }
        self.hierarchy.validate()
    }
}

/// A ranked match returned by [`RetrievalStore::search`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: DocumentId,
    /// Inner product with the query; cosine similarity for unit vectors
    pub score: f32,
    pub hierarchy: FolderHierarchy,
    pub content: String,
    pub mime_type: String,
    pub file_size: u64,
}

/// Summary of what a store holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub document_count: u64,
    pub root_folder_count: u64,
    pub max_folder_depth: Option<u32>,
    pub embedding_dimension: usize,
    pub model_id: String,
}

/// Persistent home for document records and their embeddings.
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    /// Dimension every stored and queried embedding must have
    fn embedding_dimension(&self) -> usize;

    /// Accept a record and assign its id. The record may stay buffered
    /// until the next [`flush`](RetrievalStore::flush).
    async fn insert(&self, record: DocumentRecord) -> Result<DocumentId>;

    /// Make every accepted record durable and searchable.
    async fn flush(&self) -> Result<()>;

    /// Up to `limit` records satisfying `filter`, best score first. Equal
    /// scores keep insertion order.
    async fn search(
        &self,
        query: &[f16],
        filter: &CompiledFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Inner product of two half-precision vectors, accumulated in f32.
pub fn inner_product(a: &[f16], b: &[f16]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x.to_f32() * y.to_f32()).sum()
}
