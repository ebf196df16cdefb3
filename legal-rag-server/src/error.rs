use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use legal_rag::RagError;
use thiserror::Error;
use tracing::error;

use crate::protocol::ErrorBody;

/// Failures returned to HTTP clients as `{ "detail": ... }`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body was malformed or out of bounds.
    #[error("{0}")]
    Validation(String),

    /// The service failed while answering.
    #[error(transparent)]
    Rag(#[from] RagError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Rag(RagError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Rag(RagError::Config(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Rag(RagError::GenerationTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Rag(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "query failed");
        }
        let detail = match &self {
            ApiError::Rag(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                format!("Internal server error: {e}")
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
