use std::sync::Arc;

use legal_rag::{FallbackGenerator, HashingEmbedder, RagConfig, RagService, build_index};
use legal_rag_server::{AppState, app_router};
use serde_json::{Value, json};

async fn spawn_server() -> (String, tokio::task::JoinHandle<()>) {
    let corpus = tempfile::tempdir().expect("corpus dir");
    tokio::fs::write(
        corpus.path().join("msa.txt"),
        "Either party may terminate this Agreement upon sixty (60) days prior written notice.",
    )
    .await
    .expect("write msa");
    tokio::fs::write(
        corpus.path().join("payment.txt"),
        "The Customer shall pay all invoices within thirty (30) days of receipt.",
    )
    .await
    .expect("write payment");

    let embedder = Arc::new(HashingEmbedder::default());
    let (index, _) = build_index(corpus.path(), embedder.as_ref(), &RagConfig::default(), 16)
        .await
        .expect("build index");
    let service = RagService::builder()
        .config(RagConfig::default())
        .embedding_provider(embedder)
        .index(Arc::new(index))
        .generator(Arc::new(FallbackGenerator::extractive_only()))
        .build()
        .expect("service");

    let app = app_router(AppState::new(Arc::new(service)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn health_and_stats_report_the_index() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("health response")
        .json()
        .await
        .expect("health json");
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["model_loaded"], true);
    assert_eq!(health["index_size"], 2);

    let stats: Value = client
        .get(format!("{}/stats", base))
        .send()
        .await
        .expect("stats response")
        .json()
        .await
        .expect("stats json");
    assert_eq!(stats["total_documents"], 2);
    assert_eq!(stats["embedding_dimension"], 384);
    assert_eq!(stats["embedding_model"], "hashing-384");
    assert_eq!(stats["index_type"], "flat");
    assert_eq!(stats["top_k_default"], 5);

    let root = client.get(format!("{}/", base)).send().await.expect("root response");
    assert!(root.status().is_success());

    handle.abort();
}

#[tokio::test]
async fn query_returns_answer_sources_and_metadata() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/query", base))
        .json(&json!({ "question": "How much notice is needed to terminate?", "top_k": 2 }))
        .send()
        .await
        .expect("query response");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("query json");
    assert_eq!(body["question"], "How much notice is needed to terminate?");
    assert!(body["answer"].as_str().is_some_and(|a| !a.is_empty()));
    let sources = body["sources"].as_array().expect("sources array");
    assert_eq!(sources[0]["source_file"], "msa.txt");
    assert_eq!(body["metadata"]["num_sources"], sources.len());
    assert_eq!(body["metadata"]["answer_kind"], "fallback");

    let without_sources: Value = client
        .post(format!("{}/query", base))
        .json(&json!({ "question": "When are invoices due?", "return_sources": false }))
        .send()
        .await
        .expect("query response")
        .json()
        .await
        .expect("query json");
    assert!(without_sources.get("sources").is_none());
    assert!(without_sources.get("metadata").is_some());

    handle.abort();
}

#[tokio::test]
async fn invalid_requests_are_rejected_with_detail() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    for body in [
        json!({ "question": "" }),
        json!({ "question": "x".repeat(501) }),
        json!({ "question": "ok", "top_k": 0 }),
        json!({ "question": "ok", "top_k": 21 }),
        json!({ "top_k": 3 }),
    ] {
        let response = client
            .post(format!("{}/query", base))
            .json(&body)
            .send()
            .await
            .expect("query response");
        assert_eq!(response.status().as_u16(), 422, "body {body}");
        let error: Value = response.json().await.expect("error json");
        assert!(error["detail"].as_str().is_some());
    }

    handle.abort();
}
