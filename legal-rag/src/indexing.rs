//! Offline index construction: load → chunk → embed → add.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::chunking::{Chunker, TextChunker};
use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::flat::FlatIndex;
use crate::index::VectorIndex;
use crate::loader::{DocumentLoader, filter_readable};

/// Chunks embedded per provider call when no batch size is given.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Counts gathered while building an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Documents found in the corpus directory.
    pub documents: usize,
    /// Documents dropped because they had no readable content.
    pub skipped: usize,
    /// Chunks embedded and stored.
    pub chunks: usize,
}

/// Build a [`FlatIndex`] from every document in `directory`.
///
/// Documents are loaded with the default [`DocumentLoader`], empty ones are
/// skipped, and the rest are chunked with `config.chunk_size` and
/// `config.chunk_overlap`. Chunk texts are embedded `batch_size` at a time.
///
/// # Errors
///
/// Returns [`RagError::InvalidInput`] if `batch_size` is zero, and propagates
/// loader, embedding and index errors unchanged.
pub async fn build_index(
    directory: impl AsRef<Path>,
    embedder: &dyn EmbeddingProvider,
    config: &RagConfig,
    batch_size: usize,
) -> Result<(FlatIndex, BuildReport)> {
    if batch_size == 0 {
        return Err(RagError::InvalidInput("batch size must be at least 1".to_string()));
    }
    config.validate()?;

    // 1. Load
    let documents = DocumentLoader::new().load_all_documents(directory).await?;
    let loaded = documents.len();
    let documents = filter_readable(documents);
    let mut report =
        BuildReport { documents: loaded, skipped: loaded - documents.len(), chunks: 0 };

    // 2. Chunk
    let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap);
    let chunks: Vec<_> = documents.iter().flat_map(|document| chunker.chunk(document)).collect();

    // 3. Embed and add, batch by batch
    let index = FlatIndex::new(embedder.dimensions());
    for (batch_number, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).await.map_err(|e| {
            error!(batch = batch_number, error = %e, "embedding failed during indexing");
            e
        })?;
        index.add(&embeddings, batch).await?;
        report.chunks += batch.len();
    }

    info!(
        documents = report.documents,
        skipped = report.skipped,
        chunks = report.chunks,
        embedder = embedder.name(),
        "built index"
    );
    Ok((index, report))
}
