//! # treescope-embed
//!
//! Text embedding providers for the treescope document index.
//!
//! Two providers ship with the crate:
//!
//! - [`FastEmbedProvider`] runs a local ONNX sentence-transformer through
//!   FastEmbed. The default is `all-MiniLM-L6-v2`, which yields 384-dimension
//!   unit-length vectors.
//! - [`HashingEmbeddingProvider`] is a deterministic FNV feature-hashing
//!   embedder that needs no model download.
//!
//! ```no_run
//! use treescope_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default_with_path("/tmp/models")).await?;
//! let vector = provider.embed_text("quarterly sales").await?;
//! assert_eq!(vector.len(), provider.embedding_dimension());
//! # Ok(())
//! # }
//! ```
//!
//! Embeddings are half precision ([`half::f16`]) to keep storage small.

pub mod config;
pub mod error;
pub mod hashing;
pub mod provider;

pub use config::{DEFAULT_MODEL_NAME, EmbedConfig, KNOWN_MODELS};
pub use error::{EmbedError, Result};
pub use hashing::{HASHING_MODEL_NAME, HashingEmbeddingProvider};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider, to_f16_vector};
