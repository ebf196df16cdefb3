//! Exact inner-product index with on-disk persistence.
//!
//! [`FlatIndex`] scores every stored vector against the query, which is fast
//! enough for corpora of a few thousand chunks and gives deterministic
//! ordering. Vectors and chunk metadata share one `tokio::sync::RwLock`, so
//! `add` mutates both under a single write guard while searches proceed
//! concurrently under read guards.
//!
//! # On-disk format
//!
//! An index is persisted as two files that are always read and written
//! together:
//!
//! - the **index file**: `LRAGFLAT` magic, `u32` format version, `u32`
//!   dimension, `u64` entry count, then `count * dimension` `f32` values, all
//!   little-endian;
//! - the **metadata file**: a JSON array of [`Chunk`]s, where element `i`
//!   describes vector `i`.

use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

const MAGIC: &[u8; 8] = b"LRAGFLAT";
/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8;

#[derive(Debug, Default)]
struct Entries {
    /// Row-major, `dimensions` floats per entry.
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
}

/// An exhaustive inner-product [`VectorIndex`].
#[derive(Debug)]
pub struct FlatIndex {
    dimensions: usize,
    entries: RwLock<Entries>,
}

impl FlatIndex {
    /// Create an empty index for vectors of length `dimensions`.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, entries: RwLock::new(Entries::default()) }
    }

    /// Write the index and metadata files, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if either file cannot be written.
    pub async fn save(
        &self,
        index_path: impl AsRef<Path>,
        metadata_path: impl AsRef<Path>,
    ) -> Result<()> {
        let (index_path, metadata_path) = (index_path.as_ref(), metadata_path.as_ref());
        let entries = self.entries.read().await;
        let count = entries.chunks.len();

        let mut bytes = Vec::with_capacity(HEADER_LEN + entries.vectors.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimensions as u32).to_le_bytes());
        bytes.extend_from_slice(&(count as u64).to_le_bytes());
        for value in &entries.vectors {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let metadata = serde_json::to_vec(&entries.chunks).map_err(|e| {
            RagError::corrupt(metadata_path, format!("cannot serialize chunks: {e}"))
        })?;
        drop(entries);

        for path in [index_path, metadata_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| RagError::io(parent, e))?;
            }
        }
        tokio::fs::write(index_path, bytes).await.map_err(|e| RagError::io(index_path, e))?;
        tokio::fs::write(metadata_path, metadata)
            .await
            .map_err(|e| RagError::io(metadata_path, e))?;

        info!(
            index = %index_path.display(),
            metadata = %metadata_path.display(),
            vectors = count,
            dimensions = self.dimensions,
            "saved index"
        );
        Ok(())
    }

    /// Load an index previously written by [`save`](FlatIndex::save).
    ///
    /// The dimension is taken from the index file itself.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotFound`] if either file is missing and
    /// [`RagError::CorruptIndex`] if either fails to parse or the entry counts
    /// disagree.
    pub async fn load(
        index_path: impl AsRef<Path>,
        metadata_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let (index_path, metadata_path) = (index_path.as_ref(), metadata_path.as_ref());
        for (kind, path) in [("Index", index_path), ("Metadata", metadata_path)] {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(RagError::IndexNotFound { kind, path: path.to_path_buf() });
            }
        }

        let bytes = tokio::fs::read(index_path).await.map_err(|e| RagError::io(index_path, e))?;
        let (dimensions, vectors) =
            decode_index(&bytes).map_err(|m| RagError::corrupt(index_path, m))?;

        let raw = tokio::fs::read(metadata_path).await.map_err(|e| RagError::io(metadata_path, e))?;
        let chunks: Vec<Chunk> = serde_json::from_slice(&raw)
            .map_err(|e| RagError::corrupt(metadata_path, format!("invalid chunk metadata: {e}")))?;

        let count = vectors.len() / dimensions;
        if chunks.len() != count {
            return Err(RagError::corrupt(
                metadata_path,
                format!("{} metadata entries for {count} vectors", chunks.len()),
            ));
        }

        info!(vectors = count, dimensions, "loaded index");
        Ok(Self { dimensions, entries: RwLock::new(Entries { vectors, chunks }) })
    }

    fn validate(&self, vectors: &[Vec<f32>], chunks: &[Chunk]) -> Result<()> {
        if self.dimensions == 0 && !vectors.is_empty() {
            return Err(RagError::InvalidInput(
                "index was created with dimension zero and cannot hold vectors".to_string(),
            ));
        }
        if vectors.len() != chunks.len() {
            return Err(RagError::InvalidInput(format!(
                "{} vectors but {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimensions {
                return Err(RagError::InvalidInput(format!(
                    "vector {i} has dimension {}, expected {}",
                    vector.len(),
                    self.dimensions
                )));
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(RagError::InvalidInput(format!("vector {i} contains NaN or Inf")));
            }
        }
        Ok(())
    }
}

fn decode_index(bytes: &[u8]) -> std::result::Result<(usize, Vec<f32>), String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!("file is {} bytes, shorter than the header", bytes.len()));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    if &header[..8] != MAGIC {
        return Err("missing LRAGFLAT magic".to_string());
    }
    let read_u32 = |at: usize| {
        u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]])
    };
    let version = read_u32(8);
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }
    let dimensions = read_u32(12) as usize;
    if dimensions == 0 {
        return Err("dimension is zero".to_string());
    }
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header[16..24]);
    let count = u64::from_le_bytes(count_bytes);

    let expected = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(dimensions))
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| format!("entry count {count} overflows"))?;
    if body.len() != expected {
        return Err(format!("expected {expected} bytes of vector data, found {}", body.len()));
    }

    let vectors: Vec<f32> =
        body.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect();
    if vectors.iter().any(|x| !x.is_finite()) {
        return Err("vector data contains NaN or Inf".to_string());
    }
    Ok((dimensions, vectors))
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn len(&self) -> usize {
        self.entries.read().await.chunks.len()
    }

    async fn add(&self, vectors: &[Vec<f32>], chunks: &[Chunk]) -> Result<()> {
        if let Err(e) = self.validate(vectors, chunks) {
            warn!(error = %e, "rejected batch");
            return Err(e);
        }
        if vectors.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.write().await;
        entries.vectors.reserve(vectors.len() * self.dimensions);
        for vector in vectors {
            entries.vectors.extend_from_slice(vector);
        }
        entries.chunks.extend_from_slice(chunks);
        info!(added = chunks.len(), total = entries.chunks.len(), "added vectors to index");
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimensions {
            return Err(RagError::InvalidInput(format!(
                "query has dimension {}, expected {}",
                query.len(),
                self.dimensions
            )));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(RagError::InvalidInput("query contains NaN or Inf".to_string()));
        }

        let entries = self.entries.read().await;
        if entries.chunks.is_empty() {
            warn!("index is empty, no results to return");
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = entries
            .vectors
            .chunks_exact(self.dimensions)
            .map(|stored| stored.iter().zip(query).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();
        // Stable sort: equal scores keep insertion order. Scores are finite,
        // and `-0.0 == 0.0` must count as a tie.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .filter_map(|(position, score)| {
                entries
                    .chunks
                    .get(position)
                    .map(|chunk| SearchResult { chunk: chunk.clone(), score, position })
            })
            .collect())
    }
}
