//! RAG orchestrator.
//!
//! The [`RagService`] answers a question in two strictly ordered phases:
//! retrieval ([`Retriever`]) and then generation ([`Generator`]). It owns no
//! global state; construct one per loaded index and share it behind an `Arc`.
//!
//! # Example
//!
//! ```rust,ignore
//! use legal_rag::{
//!     FallbackGenerator, FlatIndex, HashingEmbedder, QueryOptions, RagConfig, RagService,
//! };
//!
//! let index =
//!     FlatIndex::load("data/embeddings/index.bin", "data/embeddings/metadata.json").await?;
//! let service = RagService::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbedder::default()))
//!     .index(Arc::new(index))
//!     .generator(Arc::new(FallbackGenerator::extractive_only()))
//!     .build()?;
//!
//! let response = service.query(&QueryOptions::new("What is the notice period?")).await?;
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::config::{NO_INFORMATION_ANSWER, RagConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{Generation, Generator};
use crate::index::VectorIndex;
use crate::response::{AnswerKind, QueryOptions, RagResponse, ResponseMetadata, Source};
use crate::retriever::{Retriever, assemble_context};

/// The question-answering service.
///
/// Coordinates query execution (embed → search → filter → assemble context →
/// generate). Construct one via [`RagService::builder()`].
pub struct RagService {
    config: RagConfig,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
}

impl RagService {
    /// Create a new [`RagServiceBuilder`].
    pub fn builder() -> RagServiceBuilder {
        RagServiceBuilder::default()
    }

    /// Return a reference to the service configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Return a reference to the generator.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Number of chunks in the loaded index.
    pub async fn index_size(&self) -> usize {
        self.retriever.index().len().await
    }

    /// Answer a question.
    ///
    /// When nothing is retrieved the fixed no-information answer is returned
    /// with empty sources and zero-count metadata, regardless of the
    /// `return_*` flags.
    ///
    /// # Errors
    ///
    /// Retrieval failures are returned unchanged. A generator error becomes
    /// [`RagError::Generation`]; exceeding the configured generation timeout
    /// becomes [`RagError::GenerationTimeout`].
    pub async fn query(&self, options: &QueryOptions) -> Result<RagResponse> {
        let started = Instant::now();
        let question = options.question.as_str();
        info!(question, top_k = ?options.top_k, "query received");

        // 1. Retrieve
        let results = self.retriever.retrieve(question, options.top_k, None).await?;
        let retrieval_time = started.elapsed().as_secs_f64();

        if results.is_empty() {
            info!(retrieval_time, "no chunks retrieved");
            return Ok(RagResponse {
                answer: NO_INFORMATION_ANSWER.to_string(),
                question: question.to_string(),
                sources: Some(Vec::new()),
                metadata: Some(ResponseMetadata {
                    num_sources: 0,
                    retrieval_time,
                    generation_time: 0.0,
                    total_time: started.elapsed().as_secs_f64(),
                    avg_similarity: None,
                    answer_kind: AnswerKind::NoResults,
                    fallback_reason: None,
                }),
            });
        }

        // 2. Build context from the same results
        let context = assemble_context(&results, self.config.max_context_length);

        // 3. Generate
        let generation_started = Instant::now();
        let timeout = self.config.generation_timeout();
        let generation =
            match tokio::time::timeout(timeout, self.generator.generate(question, &context)).await {
                Ok(Ok(generation)) => generation,
                Ok(Err(e)) => {
                    error!(generator = self.generator.name(), error = %e, "generation failed");
                    return Err(match e {
                        RagError::Generation { .. } => e,
                        other => RagError::Generation {
                            provider: self.generator.name().to_string(),
                            message: other.to_string(),
                        },
                    });
                }
                Err(_) => {
                    error!(
                        generator = self.generator.name(),
                        timeout_secs = timeout.as_secs(),
                        "generation timed out"
                    );
                    return Err(RagError::GenerationTimeout { seconds: timeout.as_secs() });
                }
            };
        let generation_time = generation_started.elapsed().as_secs_f64();

        // 4. Assemble the response
        let (answer_kind, fallback_reason) = match &generation {
            Generation::Generated(_) => (AnswerKind::Generated, None),
            Generation::Fallback { reason, .. } => (AnswerKind::Fallback, Some(reason.clone())),
        };
        let sources = options.return_sources.then(|| results.iter().map(Source::from).collect());
        let avg_similarity = results.iter().map(|r| r.score).sum::<f32>() / results.len() as f32;

        let total_time = started.elapsed().as_secs_f64();
        let metadata = options.return_metadata.then(|| ResponseMetadata {
            num_sources: results.len(),
            retrieval_time,
            generation_time,
            total_time,
            avg_similarity: Some(avg_similarity),
            answer_kind,
            fallback_reason,
        });

        info!(
            num_sources = results.len(),
            retrieval_time,
            generation_time,
            total_time,
            ?answer_kind,
            "query completed"
        );

        Ok(RagResponse {
            answer: generation.into_text(),
            question: question.to_string(),
            sources,
            metadata,
        })
    }
}

/// Builder for constructing a [`RagService`].
///
/// All fields are required. Call [`build()`](RagServiceBuilder::build)
/// to validate and produce the service.
#[derive(Default)]
pub struct RagServiceBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    generator: Option<Arc<dyn Generator>>,
}

impl RagServiceBuilder {
    /// Set the service configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider used for queries.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the loaded vector index.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagService`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing or the
    /// config is invalid, and [`RagError::DimensionMismatch`] if the embedding
    /// provider and index disagree on dimensionality.
    pub fn build(self) -> Result<RagService> {
        let config = self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let index = self.index.ok_or_else(|| RagError::Config("index is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;

        let retriever = Retriever::new(embedding_provider, index, config.clone())?;
        Ok(RagService { config, retriever, generator })
    }
}
