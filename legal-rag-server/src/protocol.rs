//! JSON bodies accepted and returned by the HTTP API.

use legal_rag::QueryOptions;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Longest accepted question, in characters.
pub const MAX_QUESTION_CHARS: usize = 500;
/// Largest accepted `top_k`.
pub const MAX_TOP_K: usize = 20;
/// `top_k` used when a request omits it.
pub const DEFAULT_TOP_K: usize = 5;

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_true")]
    pub return_sources: bool,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_true() -> bool {
    true
}

impl QueryRequest {
    /// Check field bounds and convert into service options. Metadata is always requested.
    pub fn into_options(self) -> Result<QueryOptions, ApiError> {
        let length = self.question.chars().count();
        if length == 0 || length > MAX_QUESTION_CHARS {
            return Err(ApiError::Validation(format!(
                "question must be between 1 and {MAX_QUESTION_CHARS} characters, got {length}"
            )));
        }
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(ApiError::Validation(format!(
                "top_k must be between 1 and {MAX_TOP_K}, got {}",
                self.top_k
            )));
        }
        Ok(QueryOptions::new(self.question)
            .top_k(self.top_k)
            .return_sources(self.return_sources)
            .return_metadata(true))
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub index_size: usize,
    pub version: String,
}

/// Body of `GET /stats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsResponse {
    /// Number of indexed chunks.
    pub total_documents: usize,
    pub embedding_dimension: usize,
    pub embedding_model: String,
    pub index_type: String,
    pub top_k_default: usize,
    pub similarity_threshold: f32,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub detail: String,
}
