//! SQLite implementation of [`RetrievalStore`].
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE documents (
//!     id INTEGER PRIMARY KEY,          -- assigned by the store, increasing
//!     embedding BLOB NOT NULL,         -- f16 vector, little-endian
//!     folder_depth INTEGER NOT NULL,
//!     root_folder TEXT NOT NULL,
//!     parent_folder TEXT NOT NULL,
//!     full_path TEXT NOT NULL,         -- not unique: re-indexing appends
//!     content TEXT NOT NULL,
//!     mime_type TEXT NOT NULL,
//!     file_size INTEGER NOT NULL,
//!     created_at TIMESTAMP NOT NULL
//! );
//!
//! -- Exactly one row: the model every stored vector came from
//! CREATE TABLE embedding_model (
//!     id INTEGER PRIMARY KEY CHECK (id = 1),
//!     model_name TEXT NOT NULL,
//!     provider TEXT NOT NULL,
//!     dimension INTEGER NOT NULL,
//!     normalized BOOLEAN NOT NULL,
//!     registered_at TIMESTAMP NOT NULL
//! );
//! ```
//!
//! Searches run the compiled filter as a `WHERE` clause, score every
//! candidate with an exact inner product, and load full rows only for the
//! winners.

use super::{DocumentId, DocumentRecord, RetrievalStore, SearchHit, StoreStats, inner_product};
use crate::error::{RetrievalError, Result};
use crate::retrieval::filter::CompiledFilter;
use crate::retrieval::hierarchy::FolderHierarchy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use half::f16;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use treescope_embed::EmbeddingProvider;

/// Default number of buffered inserts committed per transaction.
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 64;

/// Identity of the embedding model behind a store's vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddingModelMetadata {
    /// Name of the embedding model (e.g., "all-MiniLM-L6-v2")
    pub model_name: String,
    /// Provider of the embedding model (e.g., "fastembed")
    pub provider: String,
    pub dimension: usize,
    pub normalized: bool,
}

impl EmbeddingModelMetadata {
    pub fn new(model_name: impl Into<String>, provider: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_name: model_name.into(),
            provider: provider.into(),
            dimension,
            normalized: false,
        }
    }

    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Describe the model behind an embedding provider.
    pub fn from_provider(provider: &dyn EmbeddingProvider) -> Self {
        Self::new(
            provider.model_name(),
            provider.provider_name(),
            provider.embedding_dimension(),
        )
        .with_normalized(provider.is_normalized())
    }

    /// Create a unique identifier for this model configuration
    pub fn model_id(&self) -> String {
        let normalized_part = if self.normalized { "norm" } else { "raw" };
        format!(
            "{}:{}:{}:{}",
            self.provider, self.model_name, self.dimension, normalized_part
        )
    }
}

#[derive(Debug)]
struct WriteBuffer {
    next_id: DocumentId,
    pending: Vec<(DocumentId, DocumentRecord)>,
}

/// SQLite-backed document store with buffered inserts.
pub struct SqliteStore {
    pool: SqlitePool,
    model: EmbeddingModelMetadata,
    write_batch_size: usize,
    buffer: Mutex<WriteBuffer>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("model", &self.model)
            .field("write_batch_size", &self.write_batch_size)
            .finish()
    }
}

impl SqliteStore {
    /// Open or create the database at `db_path`.
    ///
    /// A database already registered to a different model or dimension is
    /// refused with a configuration error.
    ///
    /// Ids are handed out from the largest id seen at open time, so each
    /// database file supports one writing store at a time. A commit that
    /// finds rows appended by another writer fails with a configuration error
    /// and leaves its records buffered.
    pub async fn open(db_path: &Path, model: &EmbeddingModelMetadata) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Self::connect(db_path, model, true).await
    }

    /// Open a database that must already exist, for read-only commands.
    pub async fn open_existing(db_path: &Path, model: &EmbeddingModelMetadata) -> Result<Self> {
        if !tokio::fs::try_exists(db_path).await? {
            return Err(RetrievalError::configuration(format!(
                "no index at {}",
                db_path.display()
            )));
        }
        Self::connect(db_path, model, false).await
    }

    async fn connect(
        db_path: &Path,
        model: &EmbeddingModelMetadata,
        create_if_missing: bool,
    ) -> Result<Self> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(create_if_missing),
        )
        .await?;

        info!("Opened document store at {}", db_path.display());
        Self::new_with_pool(pool, model).await
    }

    /// Open a private in-memory database, mainly for tests.
    pub async fn open_memory(model: &EmbeddingModelMetadata) -> Result<Self> {
        // Every connection to :memory: is a separate database, so pin one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool, model).await
    }

    async fn new_with_pool(pool: SqlitePool, model: &EmbeddingModelMetadata) -> Result<Self> {
        if model.dimension == 0 {
            return Err(RetrievalError::configuration(
                "embedding dimension must be at least 1",
            ));
        }

        Self::create_tables(&pool).await?;
        Self::register_model(&pool, model).await?;

        let max_id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM documents")
            .fetch_one(&pool)
            .await?;

        Ok(Self {
            pool,
            model: model.clone(),
            write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
            buffer: Mutex::new(WriteBuffer {
                next_id: max_id.unwrap_or(0) + 1,
                pending: Vec::new(),
            }),
        })
    }

    /// Commit automatically once this many inserts are buffered.
    pub fn with_write_batch_size(mut self, write_batch_size: usize) -> Self {
        self.write_batch_size = write_batch_size.max(1);
        self
    }

    pub fn model(&self) -> &EmbeddingModelMetadata {
        &self.model
    }

    /// Number of inserted records not yet committed
    pub async fn pending_count(&self) -> usize {
        self.buffer.lock().await.pending.len()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                embedding BLOB NOT NULL,
                folder_depth INTEGER NOT NULL,
                root_folder TEXT NOT NULL,
                parent_folder TEXT NOT NULL,
                full_path TEXT NOT NULL,
                content TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embedding_model (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                model_name TEXT NOT NULL,
                provider TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                normalized BOOLEAN NOT NULL,
                registered_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        for column in ["folder_depth", "root_folder", "parent_folder", "full_path"] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_documents_{column} ON documents({column})"
            ))
            .execute(pool)
            .await?;
        }

        Ok(())
    }

    async fn register_model(pool: &SqlitePool, model: &EmbeddingModelMetadata) -> Result<()> {
        let existing = sqlx::query(
            "SELECT model_name, provider, dimension, normalized, registered_at FROM embedding_model WHERE id = 1",
        )
        .fetch_optional(pool)
        .await?;

        let Some(row) = existing else {
            sqlx::query(
                r#"
                INSERT INTO embedding_model (id, model_name, provider, dimension, normalized, registered_at)
                VALUES (1, ?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&model.model_name)
            .bind(&model.provider)
            .bind(model.dimension as i64)
            .bind(model.normalized)
            .bind(Utc::now())
            .execute(pool)
            .await?;
            info!("Registered embedding model {}", model.model_id());
            return Ok(());
        };

        let dimension: i64 = row.try_get("dimension")?;
        let registered = EmbeddingModelMetadata::new(
            row.try_get::<String, _>("model_name")?,
            row.try_get::<String, _>("provider")?,
            usize::try_from(dimension).map_err(|_| {
                RetrievalError::Corrupt(format!("stored dimension {dimension} is invalid"))
            })?,
        )
        .with_normalized(row.try_get("normalized")?);
        let registered_at: DateTime<Utc> = row.try_get("registered_at")?;

        if registered.dimension != model.dimension {
            return Err(RetrievalError::configuration(format!(
                "index holds {}-dimension embeddings but the configured model produces {}",
                registered.dimension, model.dimension
            )));
        }
        if registered != *model {
            return Err(RetrievalError::configuration(format!(
                "index was built with {} (registered {}), configured model is {}",
                registered.model_id(),
                registered_at.format("%Y-%m-%d"),
                model.model_id()
            )));
        }

        debug!("Embedding model {} matches index", model.model_id());
        Ok(())
    }

    async fn commit(&self, pending: &mut Vec<(DocumentId, DocumentRecord)>) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let first_id = pending[0].0;
        let max_id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM documents")
            .fetch_one(&mut *tx)
            .await?;
        if let Some(max_id) = max_id.filter(|max_id| *max_id >= first_id) {
            return Err(RetrievalError::configuration(format!(
                "index already holds document {max_id}; another writer appended to it since this store was opened"
            )));
        }

        for (id, record) in pending.iter() {
            let embedding_bytes = encode_embedding(&record.embedding);
            sqlx::query(
                r#"
                INSERT INTO documents (id, embedding, folder_depth, root_folder, parent_folder,
                                       full_path, content, mime_type, file_size, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(id)
            .bind(embedding_bytes)
            .bind(record.hierarchy.folder_depth as i64)
            .bind(&record.hierarchy.root_folder)
            .bind(&record.hierarchy.parent_folder)
            .bind(&record.hierarchy.full_path)
            .bind(&record.content)
            .bind(&record.mime_type)
            .bind(record.file_size as i64)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!("Committed {} documents", pending.len());
        pending.clear();
        Ok(())
    }

    fn decode_embedding(&self, id: DocumentId, bytes: &[u8]) -> Result<Vec<f16>> {
        let expected = self.model.dimension * std::mem::size_of::<f16>();
        if bytes.len() != expected {
            return Err(RetrievalError::Corrupt(format!(
                "document {id} has a {}-byte embedding, expected {expected}",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| f16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }

    fn hit_from_row(row: &SqliteRow, score: f32) -> Result<SearchHit> {
        let id: i64 = row.try_get("id")?;
        let depth: i64 = row.try_get("folder_depth")?;
        let size: i64 = row.try_get("file_size")?;
        let corrupt = |what: &str| RetrievalError::Corrupt(format!("document {id} has invalid {what}"));

        Ok(SearchHit {
            id,
            score,
            hierarchy: FolderHierarchy {
                folder_depth: u32::try_from(depth).map_err(|_| corrupt("folder_depth"))?,
                root_folder: row.try_get("root_folder")?,
                parent_folder: row.try_get("parent_folder")?,
                full_path: row.try_get("full_path")?,
            },
            content: row.try_get("content")?,
            mime_type: row.try_get("mime_type")?,
            file_size: u64::try_from(size).map_err(|_| corrupt("file_size"))?,
        })
    }
}

fn encode_embedding(embedding: &[f16]) -> Vec<u8> {
    embedding.iter().flat_map(|value| value.to_le_bytes()).collect()
}

#[async_trait]
impl RetrievalStore for SqliteStore {
    fn embedding_dimension(&self) -> usize {
        self.model.dimension
    }

    async fn insert(&self, record: DocumentRecord) -> Result<DocumentId> {
        record.validate(self.model.dimension)?;

        let mut buffer = self.buffer.lock().await;
        let id = buffer.next_id;
        buffer.next_id += 1;
        buffer.pending.push((id, record));

        if buffer.pending.len() >= self.write_batch_size {
            self.commit(&mut buffer.pending).await?;
        }
        Ok(id)
    }

    async fn flush(&self) -> Result<()> {
        let mut buffer = self.buffer.lock().await;
        self.commit(&mut buffer.pending).await?;
        drop(buffer);

        sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        query: &[f16],
        filter: &CompiledFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.model.dimension {
            return Err(RetrievalError::configuration(format!(
                "query embedding has dimension {}, store expects {}",
                query.len(),
                self.model.dimension
            )));
        }

        let candidates = sqlx::query(&format!(
            "SELECT id, embedding FROM documents WHERE {filter} ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(candidates.len());
        for row in &candidates {
            let id: i64 = row.try_get("id")?;
            let bytes: Vec<u8> = row.try_get("embedding")?;
            let embedding = self.decode_embedding(id, &bytes)?;
            scored.push((inner_product(query, &embedding), id));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(limit);

        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; scored.len()].join(", ");
        let sql = format!(
            "SELECT id, folder_depth, root_folder, parent_folder, full_path, content, mime_type, file_size
             FROM documents WHERE id IN ({placeholders})"
        );
        let mut details = sqlx::query(&sql);
        for (_, id) in &scored {
            details = details.bind(id);
        }
        let rows = details.fetch_all(&self.pool).await?;

        let mut by_id = std::collections::HashMap::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("id")?;
            by_id.insert(id, row);
        }

        let mut hits = Vec::with_capacity(scored.len());
        for (score, id) in scored {
            let row = by_id.get(&id).ok_or_else(|| {
                RetrievalError::Corrupt(format!("document {id} vanished during search"))
            })?;
            let hit = Self::hit_from_row(row, score)?;
            if filter.matches(&hit.hierarchy) {
                hits.push(hit);
            } else {
                warn!(
                    "Dropping document {} that does not satisfy filter `{}`",
                    hit.id, filter
                );
            }
        }

        debug!(
            "Search over {} candidates returned {} hits",
            candidates.len(),
            hits.len()
        );
        Ok(hits)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS document_count,
                   COUNT(DISTINCT NULLIF(root_folder, '')) AS root_folder_count,
                   MAX(folder_depth) AS max_folder_depth
            FROM documents
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let document_count: i64 = row.try_get("document_count")?;
        let root_folder_count: i64 = row.try_get("root_folder_count")?;
        let max_folder_depth: Option<i64> = row.try_get("max_folder_depth")?;

        Ok(StoreStats {
            document_count: document_count.max(0) as u64,
            root_folder_count: root_folder_count.max(0) as u64,
            max_folder_depth: max_folder_depth.map(|d| d.clamp(0, u32::MAX as i64) as u32),
            embedding_dimension: self.model.dimension,
            model_id: self.model.model_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::filter::{FilterCondition, FilterSpec};
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn model() -> EmbeddingModelMetadata {
        EmbeddingModelMetadata::new("test-model", "test", DIM).with_normalized(true)
    }

    fn vector(values: [f32; DIM]) -> Vec<f16> {
        values.iter().copied().map(f16::from_f32).collect()
    }

    fn record(path: &str, embedding: Vec<f16>) -> DocumentRecord {
        let segments: Vec<&str> = path.split('/').collect();
        let folders = &segments[..segments.len() - 1];
        DocumentRecord {
            content: format!("contents of {path}"),
            embedding,
            hierarchy: FolderHierarchy {
                folder_depth: folders.len() as u32,
                root_folder: folders.first().copied().unwrap_or_default().to_string(),
                parent_folder: folders.last().copied().unwrap_or_default().to_string(),
                full_path: path.to_string(),
            },
            mime_type: "text/plain".into(),
            file_size: 10,
        }
    }

    #[test]
    fn test_model_id() {
        assert_eq!(model().model_id(), "test:test-model:4:norm");
        assert_eq!(
            EmbeddingModelMetadata::new("m", "p", 8).model_id(),
            "p:m:8:raw"
        );
    }

    #[tokio::test]
    async fn test_insert_flush_search_roundtrip() {
        let store = SqliteStore::open_memory(&model()).await.unwrap();
        let target = vector([0.0, 1.0, 0.0, 0.0]);

        store
            .insert(record("docs/a.txt", vector([1.0, 0.0, 0.0, 0.0])))
            .await
            .unwrap();
        let id = store
            .insert(record("docs/sub/b.txt", target.clone()))
            .await
            .unwrap();
        store.flush().await.unwrap();

        let hits = store
            .search(&target, &CompiledFilter::match_all(), 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, id);
        assert_eq!(hits[0].hierarchy.full_path, "docs/sub/b.txt");
        assert_eq!(hits[0].content, "contents of docs/sub/b.txt");
        assert!((hits[0].score - 1.0).abs() < 1e-3);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_unflushed_records_are_invisible() {
        let store = SqliteStore::open_memory(&model()).await.unwrap();
        let v = vector([1.0, 0.0, 0.0, 0.0]);
        store.insert(record("a.txt", v.clone())).await.unwrap();
        assert_eq!(store.pending_count().await, 1);

        let before = store.search(&v, &CompiledFilter::match_all(), 10).await.unwrap();
        assert!(before.is_empty());

        store.flush().await.unwrap();
        assert_eq!(store.pending_count().await, 0);
        let after = store.search(&v, &CompiledFilter::match_all(), 10).await.unwrap();
        assert_eq!(after.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_size_triggers_commit() {
        let store = SqliteStore::open_memory(&model())
            .await
            .unwrap()
            .with_write_batch_size(2);
        let v = vector([1.0, 0.0, 0.0, 0.0]);

        store.insert(record("a.txt", v.clone())).await.unwrap();
        assert_eq!(store.pending_count().await, 1);
        store.insert(record("b.txt", v.clone())).await.unwrap();
        assert_eq!(store.pending_count().await, 0);
        assert_eq!(store.stats().await.unwrap().document_count, 2);
    }

    #[tokio::test]
    async fn test_limit_and_ties() {
        let store = SqliteStore::open_memory(&model()).await.unwrap();
        let v = vector([0.5, 0.5, 0.5, 0.5]);
        let mut ids = Vec::new();
        for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
            ids.push(store.insert(record(name, v.clone())).await.unwrap());
        }
        store.flush().await.unwrap();

        let all = CompiledFilter::match_all();
        assert!(store.search(&v, &all, 0).await.unwrap().is_empty());

        let two = store.search(&v, &all, 2).await.unwrap();
        assert_eq!(two.iter().map(|h| h.id).collect::<Vec<_>>(), ids[..2].to_vec());

        let many = store.search(&v, &all, 100).await.unwrap();
        assert_eq!(many.len(), 4);
    }

    #[tokio::test]
    async fn test_filtered_search() {
        let store = SqliteStore::open_memory(&model()).await.unwrap();
        let v = vector([1.0, 0.0, 0.0, 0.0]);
        for path in [
            "docs/a.txt",
            "docs/x/y/z/deep.txt",
            "other/b.txt",
            "top.txt",
            "docs/guide/c.md",
        ] {
            store.insert(record(path, v.clone())).await.unwrap();
        }
        store.flush().await.unwrap();

        let filter = FilterSpec::new()
            .folder_depth(FilterCondition::lte(3))
            .root_folder(FilterCondition::eq("docs"))
            .compile()
            .unwrap();
        let hits = store.search(&v, &filter, 100).await.unwrap();

        let paths: Vec<_> = hits.iter().map(|h| h.hierarchy.full_path.as_str()).collect();
        assert_eq!(paths, vec!["docs/a.txt", "docs/guide/c.md"]);
        assert!(hits.iter().all(|h| filter.matches(&h.hierarchy)));
    }

    #[tokio::test]
    async fn test_query_dimension_checked() {
        let store = SqliteStore::open_memory(&model()).await.unwrap();
        let err = store
            .search(&[f16::ONE; 3], &CompiledFilter::match_all(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Configuration(_)));

        let err = store
            .insert(record("a.txt", vec![f16::ONE; DIM + 1]))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_reopen_checks_model() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("nested/index.db");

        {
            let store = SqliteStore::open(&db, &model()).await.unwrap();
            store
                .insert(record("a.txt", vector([1.0, 0.0, 0.0, 0.0])))
                .await
                .unwrap();
            store.flush().await.unwrap();
        }

        let other_dim = EmbeddingModelMetadata::new("test-model", "test", 8).with_normalized(true);
        let err = SqliteStore::open(&db, &other_dim).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Configuration(_)));
        assert!(err.to_string().contains("4-dimension"));

        let other_model = EmbeddingModelMetadata::new("other", "test", DIM).with_normalized(true);
        assert!(matches!(
            SqliteStore::open(&db, &other_model).await,
            Err(RetrievalError::Configuration(_))
        ));

        // Ids continue after the existing rows
        let store = SqliteStore::open(&db, &model()).await.unwrap();
        let id = store
            .insert(record("b.txt", vector([0.0, 1.0, 0.0, 0.0])))
            .await
            .unwrap();
        assert_eq!(id, 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = SqliteStore::open_memory(&model()).await.unwrap();
        let empty = store.stats().await.unwrap();
        assert_eq!(empty.document_count, 0);
        assert_eq!(empty.max_folder_depth, None);

        let v = vector([1.0, 0.0, 0.0, 0.0]);
        for path in ["top.txt", "docs/a.txt", "docs/b/c.txt", "misc/d.txt"] {
            store.insert(record(path, v.clone())).await.unwrap();
        }
        store.flush().await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.document_count, 4);
        assert_eq!(stats.root_folder_count, 2);
        assert_eq!(stats.max_folder_depth, Some(2));
        assert_eq!(stats.embedding_dimension, DIM);
        assert_eq!(stats.model_id, "test:test-model:4:norm");
    }

    #[tokio::test]
    async fn test_embedding_blob_is_little_endian() {
        let store = SqliteStore::open_memory(&model()).await.unwrap();
        store
            .insert(record("a.txt", vector([1.0, -2.0, 0.0, 0.5])))
            .await
            .unwrap();
        store.flush().await.unwrap();

        let blob: Vec<u8> = sqlx::query_scalar("SELECT embedding FROM documents")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(blob, vec![0x00, 0x3c, 0x00, 0xc0, 0x00, 0x00, 0x00, 0x38]);
    }

    #[tokio::test]
    async fn test_second_writer_is_refused_at_commit() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("index.db");
        let first = SqliteStore::open(&db, &model()).await.unwrap();
        let second = SqliteStore::open(&db, &model()).await.unwrap();
        let v = vector([1.0, 0.0, 0.0, 0.0]);

        first.insert(record("a.txt", v.clone())).await.unwrap();
        first.flush().await.unwrap();

        second.insert(record("b.txt", v.clone())).await.unwrap();
        let err = second.flush().await.unwrap_err();
        assert!(matches!(err, RetrievalError::Configuration(_)));
        assert!(err.to_string().contains("another writer"));
        assert_eq!(second.pending_count().await, 1);

        let stats = first.stats().await.unwrap();
        assert_eq!(stats.document_count, 1);
    }

    #[tokio::test]
    async fn test_open_existing_requires_database() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("index.db");

        let err = SqliteStore::open_existing(&db, &model()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Configuration(_)));
        assert!(err.to_string().contains("no index at"));
        assert!(!db.exists());

        drop(SqliteStore::open(&db, &model()).await.unwrap());
        let store = SqliteStore::open_existing(&db, &model()).await.unwrap();
        assert_eq!(store.stats().await.unwrap().document_count, 0);
    }
}
