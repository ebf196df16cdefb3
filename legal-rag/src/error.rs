//! Error types for the `legal-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or querying a contract index.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document directory does not exist or is not a directory.
    #[error("'{}' is not a valid directory", path.display())]
    DirectoryNotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// An I/O error outside of per-file document reads.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// The file or directory being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// One of the two persisted index artifacts is missing.
    #[error("{kind} file not found: {}", path.display())]
    IndexNotFound {
        /// Which artifact was missing (`index` or `metadata`).
        kind: &'static str,
        /// The missing path.
        path: PathBuf,
    },

    /// A persisted index artifact could not be parsed, or the pair disagrees.
    #[error("corrupt index ({}): {message}", path.display())]
    CorruptIndex {
        /// The artifact that failed to load.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// Input rejected by the vector index before any mutation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The embedding model and the loaded index disagree on dimensionality.
    #[error("dimension mismatch: embedder produces {embedder} but index holds {index}")]
    DimensionMismatch {
        /// Dimensionality reported by the embedding provider.
        embedder: usize,
        /// Dimensionality recovered from the index.
        index: usize,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation provider failed without producing an answer.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation provider did not answer within the configured timeout.
    #[error("generation timed out after {seconds}s")]
    GenerationTimeout {
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptIndex { path: path.into(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
