//! Query-time retrieval: embed, search, filter, and assemble context.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

const CONTEXT_SEPARATOR: &str = "\n\n";
/// A partial chunk is only worth including when more than this many characters fit.
const MIN_TRUNCATED_CHARS: usize = 100;

/// Finds the chunks most relevant to a free-text query.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = Retriever::new(embedder, index, RagConfig::default())?;
/// let results = retriever.retrieve("What law governs the agreement?", None, None).await?;
/// let context = retriever.get_context("What law governs the agreement?", None, None).await?;
/// ```
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: RagConfig,
}

impl Retriever {
    /// Pair an embedding provider with an index built from the same model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] when the provider's output
    /// dimensionality differs from the index's.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: RagConfig,
    ) -> Result<Self> {
        if embedder.dimensions() != index.dimensions() {
            error!(
                embedder = embedder.name(),
                embedder_dimensions = embedder.dimensions(),
                index_dimensions = index.dimensions(),
                "index was built with a different embedding dimensionality"
            );
            return Err(RagError::DimensionMismatch {
                embedder: embedder.dimensions(),
                index: index.dimensions(),
            });
        }
        Ok(Self { embedder, index, config })
    }

    /// Return a reference to the retrieval configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Return a reference to the underlying index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embed `query`, search, and drop results scoring below the threshold.
    ///
    /// `top_k` and `similarity_threshold` fall back to the configured values.
    /// Results keep the index's descending-score order.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        similarity_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let top_k = top_k.unwrap_or(self.config.top_k);
        let threshold = similarity_threshold.unwrap_or(self.config.similarity_threshold);

        let query_embedding = self.embedder.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            e
        })?;
        let results = self.index.search(&query_embedding, top_k).await.map_err(|e| {
            error!(error = %e, "index search failed");
            e
        })?;

        let filtered: Vec<SearchResult> =
            results.into_iter().filter(|r| r.score >= threshold).collect();
        info!(result_count = filtered.len(), top_k, threshold, "retrieved chunks for query");
        Ok(filtered)
    }

    /// Retrieve for `query` and join the chunk texts within `max_length` characters.
    ///
    /// `max_length` falls back to the configured `max_context_length`.
    pub async fn get_context(
        &self,
        query: &str,
        top_k: Option<usize>,
        max_length: Option<usize>,
    ) -> Result<String> {
        let results = self.retrieve(query, top_k, None).await?;
        Ok(assemble_context(&results, max_length.unwrap_or(self.config.max_context_length)))
    }
}

/// Join chunk texts in ranked order, separated by a blank line.
///
/// Chunks are added whole while they fit in `max_length` characters
/// (separators included). At the first chunk that does not fit, its leading
/// characters are added if more than 100 characters of budget remain, and
/// assembly stops. The result never exceeds `max_length` characters.
pub fn assemble_context(results: &[SearchResult], max_length: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut used = 0usize;

    for result in results {
        let text = &result.chunk.text;
        let separator = if parts.is_empty() { 0 } else { CONTEXT_SEPARATOR.len() };
        let length = text.chars().count();

        if used + separator + length > max_length {
            let remaining = max_length.saturating_sub(used + separator);
            if remaining > MIN_TRUNCATED_CHARS {
                parts.push(text.chars().take(remaining).collect());
                used += separator + remaining;
            }
            break;
        }

        parts.push(text.clone());
        used += separator + length;
    }

    info!(chunk_count = parts.len(), context_chars = used, "built context");
    parts.join(CONTEXT_SEPARATOR)
}
