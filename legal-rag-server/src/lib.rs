//! `legal-rag-server` exposes a [`RagService`](legal_rag::RagService) over HTTP.
//! Questions are posted as JSON to `/query`; `/health` and `/stats` report on
//! the loaded index.

pub mod error;
pub mod protocol;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, ServerConfig, app_router, run_server};
