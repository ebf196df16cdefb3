//! Text cleaning and chunking.
//!
//! This module provides [`clean_text`], the [`RecursiveSplitter`] that turns
//! cleaned text into bounded, overlapping windows, and [`TextChunker`], which
//! applies both to a [`Document`] and numbers the resulting [`Chunk`]s.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::document::{Chunk, Document};

/// Separators tried in priority order: paragraph, line, sentence, word, character.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\s.,!?;:()\-']").expect("unreachable error: invalid character class")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("unreachable error: invalid whitespace pattern"));

/// Normalise raw contract text before splitting.
///
/// Removes everything except word characters, whitespace and `.,!?;:()-'`,
/// then collapses whitespace runs to one space and trims. Removal happens
/// before collapsing so that `clean_text(clean_text(x)) == clean_text(x)`.
pub fn clean_text(text: &str) -> String {
    let stripped = DISALLOWED.replace_all(text, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks.
    ///
    /// Returns an empty `Vec` when the document has no usable text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Recursive boundary-seeking splitter with overlap.
///
/// Text is split on the first separator (in priority order) that occurs in
/// it, keeping each separator attached to the start of the piece that follows
/// it. Pieces shorter than `chunk_size` are merged greedily into windows;
/// longer pieces are split again with the lower-priority separators. When a
/// window is emitted, the trailing pieces totalling at most `chunk_overlap`
/// characters are carried into the next window. Lengths are in characters.
///
/// # Example
///
/// ```rust,ignore
/// use legal_rag::RecursiveSplitter;
///
/// let splitter = RecursiveSplitter::new(512, 50);
/// let windows = splitter.split_text("Either party may terminate ...");
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Create a splitter using [`DEFAULT_SEPARATORS`].
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the separator list. An empty string means "split into characters".
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Split `text` into trimmed, non-empty windows in text order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge_pieces(&fitting));
                fitting.clear();
            }
            if remaining.is_empty() {
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge_pieces(&fitting));
        }
        chunks
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                if total > self.chunk_size {
                    debug!(
                        size = total,
                        chunk_size = self.chunk_size,
                        "window longer than chunk_size"
                    );
                }
                windows.extend(join_window(&current));
                // Keep a tail of at most `chunk_overlap` characters that still leaves room.
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    let Some(first) = current.pop_front() else { break };
                    total -= char_len(first);
                }
            }
            current.push_back(piece);
            total += len;
        }
        windows.extend(join_window(&current));
        windows
    }
}

fn join_window(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Split at every occurrence of `separator`, attaching the separator to the
/// start of the following piece. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Cleans a [`Document`] and splits it into numbered [`Chunk`]s.
///
/// # Example
///
/// ```rust,ignore
/// use legal_rag::TextChunker;
///
/// let chunker = TextChunker::new(512, 50);
/// let chunks = chunker.process_documents(&documents);
/// ```
#[derive(Debug, Clone)]
pub struct TextChunker {
    splitter: RecursiveSplitter,
}

impl TextChunker {
    /// Create a chunker with the given window size and overlap, in characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { splitter: RecursiveSplitter::new(chunk_size, chunk_overlap) }
    }

    /// Create a chunker around a preconfigured splitter.
    pub fn with_splitter(splitter: RecursiveSplitter) -> Self {
        Self { splitter }
    }

    /// Clean and split one document. `total_chunks` is filled in once the
    /// document's chunk count is known.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let cleaned = clean_text(&document.content);
        if cleaned.is_empty() {
            return Vec::new();
        }

        let windows = self.splitter.split_text(&cleaned);
        let total_chunks = windows.len();
        windows
            .into_iter()
            .enumerate()
            .map(|(chunk_id, text)| Chunk {
                text,
                chunk_id,
                source_file: document.filename.clone(),
                file_type: document.file_type.clone(),
                total_chunks,
            })
            .collect()
    }

    /// Chunk every document, preserving document order.
    pub fn process_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> =
            documents.iter().flat_map(|document| self.chunk_document(document)).collect();
        info!(chunk_count = chunks.len(), document_count = documents.len(), "chunked documents");
        chunks
    }
}

impl Chunker for TextChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.chunk_document(document)
    }
}
