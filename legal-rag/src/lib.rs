//! # legal-rag
//!
//! Question answering over a corpus of legal contracts.
//!
//! ## Overview
//!
//! Contracts are loaded from a directory of text files, cleaned, split into
//! overlapping chunks and embedded into a [`FlatIndex`]. At query time a
//! [`Retriever`] finds the chunks most similar to the question and the
//! [`RagService`] hands them to a [`Generator`] for the final answer.
//!
//! - [`DocumentLoader`] - tolerant text loading with encoding fallbacks
//! - [`TextChunker`] - cleaning plus recursive character splitting
//! - [`FlatIndex`] - exact inner-product search with on-disk persistence
//! - [`Retriever`] - embed, search, threshold and context assembly
//! - [`RagService`] - the two-phase retrieve-then-generate orchestrator
//! - [`HashingEmbedder`] - deterministic offline embeddings
//! - [`FallbackGenerator`] - degrades provider failures to extractive answers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use legal_rag::{
//!     FallbackGenerator, HashingEmbedder, QueryOptions, RagConfig, RagService, build_index,
//! };
//!
//! let embedder = Arc::new(HashingEmbedder::default());
//! let config = RagConfig::default();
//! let (index, report) = build_index("data/raw", embedder.as_ref(), &config, 32).await?;
//! index.save("data/embeddings/index.bin", "data/embeddings/metadata.json").await?;
//!
//! let service = RagService::builder()
//!     .config(config)
//!     .embedding_provider(embedder)
//!     .index(Arc::new(index))
//!     .generator(Arc::new(FallbackGenerator::extractive_only()))
//!     .build()?;
//! let response = service.query(&QueryOptions::new("What are the termination conditions?")).await?;
//! println!("{}", response.answer);
//! ```
//!
//! ## Features
//!
//! - `openai` - OpenAI-compatible embeddings and chat completions

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod flat;
pub mod generation;
pub mod hashing;
pub mod index;
pub mod indexing;
pub mod loader;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod response;
pub mod retriever;

pub use chunking::{Chunker, RecursiveSplitter, TextChunker, clean_text};
pub use config::{NO_INFORMATION_ANSWER, RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use flat::FlatIndex;
pub use generation::{ExtractiveGenerator, FallbackGenerator, FallbackReason, Generation, Generator};
pub use hashing::HashingEmbedder;
pub use index::VectorIndex;
pub use indexing::{BuildReport, DEFAULT_BATCH_SIZE, build_index};
pub use loader::{DocumentLoader, FallbackEncoding, filter_readable};
#[cfg(feature = "openai")]
pub use openai::{ChatCompletionGenerator, ChatConfig, OpenAIEmbeddingProvider};
pub use pipeline::{RagService, RagServiceBuilder};
pub use response::{AnswerKind, QueryOptions, RagResponse, ResponseMetadata, Source};
pub use retriever::{Retriever, assemble_context};
