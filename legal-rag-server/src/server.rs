use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use legal_rag::{RagResponse, RagService};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    error::ApiError,
    protocol::{HealthResponse, QueryRequest, StatsResponse},
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RagService>,
}

impl AppState {
    pub fn new(service: Arc<RagService>) -> Self {
        Self { service }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/query", post(query))
        .route("/stats", get(stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig, service: Arc<RagService>) -> anyhow::Result<()> {
    let index_size = service.index_size().await;
    let app = app_router(AppState::new(service));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid host/port {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(index_size, "legal-rag listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Legal RAG API - contract question answering",
        "version": VERSION,
        "status": "running",
        "endpoints": {
            "health": "/health",
            "query": "/query",
            "stats": "/stats"
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: true,
        index_size: state.service.index_size().await,
        version: VERSION.to_string(),
    })
}

async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<RagResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    let options = request.into_options()?;
    info!(
        question = %options.question,
        top_k = ?options.top_k,
        return_sources = options.return_sources,
        "received query"
    );

    let response = state.service.query(&options).await?;
    Ok(Json(response))
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let service = &state.service;
    let embedder = service.retriever().embedder();
    Json(StatsResponse {
        total_documents: service.index_size().await,
        embedding_dimension: embedder.dimensions(),
        embedding_model: embedder.name().to_string(),
        index_type: "flat".to_string(),
        top_k_default: service.config().top_k,
        similarity_threshold: service.config().similarity_threshold,
    })
}
