//! End-to-end tests: build an index from a small contract corpus and query it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use legal_rag::{
    AnswerKind, FallbackGenerator, FallbackReason, FlatIndex, Generation, Generator,
    HashingEmbedder, NO_INFORMATION_ANSWER, QueryOptions, RagConfig, RagError, RagService, Result,
    Retriever, build_index,
};

const MSA: &str = "MASTER SERVICES AGREEMENT\n\nSection 9. Termination.\n\
    Either party may terminate this Agreement upon sixty (60) days prior written notice \
    to the other party.";
const PAYMENT: &str = "PAYMENT TERMS\n\nThe Customer shall pay all invoices within thirty (30) \
    days of receipt. Late payments accrue interest at one percent per month.";
const NDA: &str = "CONFIDENTIALITY\n\nEach party shall protect the confidential information of \
    the other party using reasonable care and shall not disclose it to third parties.";

async fn write_corpus(dir: &Path) {
    tokio::fs::write(dir.join("a_msa.txt"), MSA).await.unwrap();
    tokio::fs::write(dir.join("b_payment.txt"), PAYMENT).await.unwrap();
    tokio::fs::write(dir.join("c_nda.txt"), NDA).await.unwrap();
}

async fn index_corpus(dir: &Path) -> Arc<FlatIndex> {
    let (index, report) =
        build_index(dir, &HashingEmbedder::default(), &RagConfig::default(), 2).await.unwrap();
    assert_eq!(report.documents, 3);
    assert_eq!(report.chunks, 3);
    Arc::new(index)
}

fn service(index: Arc<FlatIndex>, generator: Arc<dyn Generator>, config: RagConfig) -> RagService {
    RagService::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbedder::default()))
        .index(index)
        .generator(generator)
        .build()
        .unwrap()
}

struct Failing;

#[async_trait]
impl Generator for Failing {
    async fn generate(&self, _question: &str, _context: &str) -> Result<Generation> {
        Err(RagError::Generation {
            provider: "failing".to_string(),
            message: "connection refused".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct Hanging;

#[async_trait]
impl Generator for Hanging {
    async fn generate(&self, _question: &str, _context: &str) -> Result<Generation> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Generation::Generated("too late".to_string()))
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

#[tokio::test]
async fn termination_question_finds_the_termination_clause() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path()).await;
    let service = service(
        index_corpus(dir.path()).await,
        Arc::new(FallbackGenerator::extractive_only()),
        RagConfig::default(),
    );

    let termination = service
        .query(&QueryOptions::new("What is the termination notice period?").return_metadata(true))
        .await
        .unwrap();
    let sources = termination.sources.as_ref().unwrap();
    assert_eq!(sources[0].source_file, "a_msa.txt");
    assert!(sources[0].text.ends_with("..."));
    assert!(termination.answer.contains("sixty"));

    let metadata = termination.metadata.as_ref().unwrap();
    assert_eq!(metadata.num_sources, sources.len());
    assert_eq!(metadata.answer_kind, AnswerKind::Fallback);
    assert_eq!(metadata.fallback_reason, Some(FallbackReason::NotConfigured));
    assert!(metadata.total_time >= metadata.retrieval_time);

    let sky = service
        .query(&QueryOptions::new("What color is the sky?").return_metadata(true))
        .await
        .unwrap();
    let termination_avg = metadata.avg_similarity.unwrap();
    let sky_avg = sky.metadata.as_ref().and_then(|m| m.avg_similarity).unwrap_or(0.0);
    assert!(termination_avg > sky_avg, "{termination_avg} <= {sky_avg}");
}

#[tokio::test]
async fn empty_corpus_returns_the_no_information_answer() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = HashingEmbedder::default();
    let (index, report) =
        build_index(dir.path(), &embedder, &RagConfig::default(), 8).await.unwrap();
    assert_eq!(report.chunks, 0);

    let generator = Arc::new(FallbackGenerator::extractive_only());
    let service = service(Arc::new(index), generator, RagConfig::default());
    let response = service.query(&QueryOptions::new("Who pays for insurance?")).await.unwrap();

    assert_eq!(response.answer, NO_INFORMATION_ANSWER);
    assert_eq!(response.sources, Some(Vec::new()));
    let metadata = response.metadata.unwrap();
    assert_eq!(metadata.num_sources, 0);
    assert_eq!(metadata.answer_kind, AnswerKind::NoResults);
    assert_eq!(metadata.avg_similarity, None);
}

#[tokio::test]
async fn response_flags_control_sources_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path()).await;
    let service = service(
        index_corpus(dir.path()).await,
        Arc::new(FallbackGenerator::extractive_only()),
        RagConfig::default(),
    );

    let response = service
        .query(&QueryOptions::new("When are invoices due?").top_k(1).return_sources(false))
        .await
        .unwrap();
    assert_eq!(response.question, "When are invoices due?");
    assert!(response.sources.is_none());
    assert!(response.metadata.is_none());
}

#[tokio::test]
async fn threshold_filtering_keeps_a_subset_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path()).await;
    let index = index_corpus(dir.path()).await;
    let retriever =
        Retriever::new(Arc::new(HashingEmbedder::default()), index, RagConfig::default()).unwrap();

    let question = "written notice to terminate the agreement";
    let all = retriever.retrieve(question, Some(5), Some(0.0)).await.unwrap();
    assert_eq!(all.len(), 3);

    for threshold in [0.2, 0.9] {
        let filtered = retriever.retrieve(question, Some(5), Some(threshold)).await.unwrap();
        assert!(filtered.iter().all(|r| r.score >= threshold));
        let expected: Vec<_> = all.iter().filter(|r| r.score >= threshold).collect();
        assert_eq!(filtered.iter().collect::<Vec<_>>(), expected);
    }
}

#[tokio::test]
async fn context_respects_the_character_budget() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path()).await;
    let index = index_corpus(dir.path()).await;
    let retriever =
        Retriever::new(Arc::new(HashingEmbedder::default()), index, RagConfig::default()).unwrap();

    for budget in [100, 150, 250, 2000] {
        let context =
            retriever.get_context("party obligations", Some(3), Some(budget)).await.unwrap();
        assert!(context.chars().count() <= budget, "context of {} chars", context.chars().count());
    }
}

#[tokio::test]
async fn embedder_and_index_dimensions_must_agree() {
    let result = Retriever::new(
        Arc::new(HashingEmbedder::new(8)),
        Arc::new(FlatIndex::new(16)),
        RagConfig::default(),
    );
    assert!(matches!(result, Err(RagError::DimensionMismatch { embedder: 8, index: 16 })));
}

#[tokio::test]
async fn generator_errors_surface_as_generation_errors() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path()).await;
    let service = service(index_corpus(dir.path()).await, Arc::new(Failing), RagConfig::default());

    let result = service.query(&QueryOptions::new("notice period")).await;
    assert!(matches!(result, Err(RagError::Generation { .. })));
}

#[tokio::test]
async fn fallback_wrapper_turns_errors_into_answers() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path()).await;
    let generator = FallbackGenerator::new(Arc::new(Failing), Duration::from_secs(5));
    let index = index_corpus(dir.path()).await;
    let service = service(index, Arc::new(generator), RagConfig::default());

    let response =
        service.query(&QueryOptions::new("notice period").return_metadata(true)).await.unwrap();
    let metadata = response.metadata.unwrap();
    assert_eq!(metadata.answer_kind, AnswerKind::Fallback);
    assert!(matches!(metadata.fallback_reason, Some(FallbackReason::ProviderError(_))));
}

#[tokio::test]
async fn slow_generation_times_out() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path()).await;
    let index = index_corpus(dir.path()).await;
    let config = RagConfig::builder().generation_timeout_secs(1).build().unwrap();
    let service = service(index, Arc::new(Hanging), config);

    tokio::time::pause();
    let result = service.query(&QueryOptions::new("notice period")).await;
    assert!(matches!(result, Err(RagError::GenerationTimeout { seconds: 1 })));
}
