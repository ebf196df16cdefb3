//! Data types for documents, chunks, and search results.

use serde::{Deserialize, Serialize};

/// A source file read from the contracts directory.
///
/// An empty `content` marks a file that could not be decoded; such documents
/// must be dropped (see [`crate::loader::filter_readable`]) before chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// File name without directory, e.g. `contract_001.txt`.
    pub filename: String,
    /// The decoded text of the file.
    pub content: String,
    /// Full path the document was read from.
    pub source_path: String,
    /// Lower-cased file extension without the dot.
    pub file_type: String,
}

impl Document {
    /// Whether the document carries any text worth chunking.
    pub fn is_readable(&self) -> bool {
        !self.content.is_empty()
    }
}

/// A bounded span of a [`Document`]'s cleaned text.
///
/// `chunk_id` is sequential within `source_file` only; two documents both
/// have a chunk `0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub text: String,
    /// Zero-based position of this chunk within its source document.
    pub chunk_id: usize,
    /// The file name of the parent document.
    pub source_file: String,
    /// The parent document's file type.
    pub file_type: String,
    /// How many chunks the parent document produced.
    pub total_chunks: usize,
}

/// A retrieved [`Chunk`] paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Inner-product score (cosine similarity for unit vectors).
    pub score: f32,
    /// Slot of the entry inside the index.
    pub position: usize,
}
