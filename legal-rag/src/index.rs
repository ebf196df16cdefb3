//! Vector index trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// An append-only similarity index over fixed-dimension, unit-norm vectors.
///
/// Every stored vector is paired with the [`Chunk`] it was computed from.
/// Implementations must grow vectors and chunks together, and must allow
/// concurrent [`search`](VectorIndex::search) calls.
///
/// # Example
///
/// ```rust,ignore
/// use legal_rag::{FlatIndex, VectorIndex};
///
/// let index = FlatIndex::new(384);
/// index.add(&embeddings, &chunks).await?;
/// let results = index.search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The fixed vector dimensionality `D`.
    fn dimensions(&self) -> usize;

    /// Number of stored entries.
    async fn len(&self) -> usize;

    /// Whether the index holds no entries.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Append `vectors[i]` paired with `chunks[i]` for every `i`.
    ///
    /// Either the whole batch is added or nothing is.
    async fn add(&self, vectors: &[Vec<f32>], chunks: &[Chunk]) -> Result<()>;

    /// Return up to `top_k` entries by descending inner product with `query`.
    ///
    /// An empty index yields an empty list.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;
}
