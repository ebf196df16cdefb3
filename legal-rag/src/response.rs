//! Request options and response envelope for [`RagService::query`](crate::RagService::query).

use serde::{Deserialize, Serialize};

use crate::document::SearchResult;
use crate::generation::FallbackReason;

/// Characters of chunk text kept in a [`Source`] excerpt.
pub const SOURCE_EXCERPT_CHARS: usize = 200;

/// Parameters of a single question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryOptions {
    /// The user's question.
    pub question: String,
    /// Override for the configured `top_k`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Include source excerpts in the response.
    #[serde(default = "default_true")]
    pub return_sources: bool,
    /// Include timing and score metadata in the response.
    #[serde(default)]
    pub return_metadata: bool,
}

fn default_true() -> bool {
    true
}

impl QueryOptions {
    /// Options for `question` with sources on and metadata off.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
            return_sources: true,
            return_metadata: false,
        }
    }

    /// Set the number of chunks to retrieve.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Toggle source excerpts.
    pub fn return_sources(mut self, enabled: bool) -> Self {
        self.return_sources = enabled;
        self
    }

    /// Toggle timing metadata.
    pub fn return_metadata(mut self, enabled: bool) -> Self {
        self.return_metadata = enabled;
        self
    }
}

/// A retrieved chunk as reported to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// The first 200 characters of the chunk, followed by `...`.
    pub text: String,
    /// File the chunk came from.
    pub source_file: String,
    /// Position of the chunk within that file.
    pub chunk_id: usize,
    /// Raw similarity score.
    pub similarity_score: f32,
}

impl From<&SearchResult> for Source {
    fn from(result: &SearchResult) -> Self {
        let mut text: String = result.chunk.text.chars().take(SOURCE_EXCERPT_CHARS).collect();
        text.push_str("...");
        Self {
            text,
            source_file: result.chunk.source_file.clone(),
            chunk_id: result.chunk.chunk_id,
            similarity_score: result.score,
        }
    }
}

/// Where the answer text came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// The language model produced the answer.
    Generated,
    /// A degraded extractive answer was used.
    Fallback,
    /// Nothing was retrieved; the fixed no-information answer was used.
    NoResults,
}

/// Timing and score details for one query. Times are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseMetadata {
    /// Number of chunks that survived threshold filtering.
    pub num_sources: usize,
    /// Seconds spent embedding the query and searching.
    pub retrieval_time: f64,
    /// Seconds spent in the generator.
    pub generation_time: f64,
    /// Seconds from entry to exit of the query.
    pub total_time: f64,
    /// Mean similarity of the retrieved chunks; absent when nothing was retrieved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_similarity: Option<f32>,
    /// Where the answer came from.
    pub answer_kind: AnswerKind,
    /// Why a fallback answer was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

/// The answer envelope returned for every question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagResponse {
    /// The answer text.
    pub answer: String,
    /// The question as asked.
    pub question: String,
    /// Retrieved sources, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Timing metadata, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}
