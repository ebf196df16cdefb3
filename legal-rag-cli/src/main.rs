use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(author, version, about = "Question answering over legal contracts", long_about = None)]
struct Cli {
    /// Log output format.
    #[arg(
        long,
        value_enum,
        default_value_t = LogFormat::Text,
        env = "LEGAL_RAG_LOG_FORMAT",
        global = true
    )]
    log_format: LogFormat,
    #[command(flatten)]
    index: IndexArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Local feature hashing, no network.
    Hashing,
    /// OpenAI-compatible embeddings API (needs OPENAI_API_KEY).
    Openai,
}

/// Where the index lives and how it is embedded.
#[derive(clap::Args, Debug, Clone)]
pub struct IndexArgs {
    /// Vector index file.
    #[arg(
        long,
        env = "LEGAL_RAG_INDEX_PATH",
        default_value = "data/embeddings/index.bin",
        global = true
    )]
    pub index_path: PathBuf,
    /// Chunk metadata file.
    #[arg(
        long,
        env = "LEGAL_RAG_METADATA_PATH",
        default_value = "data/embeddings/metadata.json",
        global = true
    )]
    pub metadata_path: PathBuf,
    /// Embedding backend. Must match the one the index was built with.
    #[arg(
        long,
        value_enum,
        env = "LEGAL_RAG_EMBEDDER",
        default_value_t = EmbedderKind::Hashing,
        global = true
    )]
    pub embedder: EmbedderKind,
    /// Embedding dimensionality. Defaults to 384 for hashing; for openai it is
    /// sent as the requested output size, otherwise the model default is used.
    #[arg(long, env = "LEGAL_RAG_DIMENSIONS", global = true)]
    pub dimensions: Option<usize>,
    /// Chat model used for answers when OPENAI_API_KEY is set.
    #[arg(long, env = "LEGAL_RAG_CHAT_MODEL", default_value = "gpt-3.5-turbo", global = true)]
    pub chat_model: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, chunk and embed a directory of contracts, then save the index.
    BuildIndex {
        /// Directory of `.txt` contracts.
        #[arg(long, env = "LEGAL_RAG_DATA_DIR", default_value = "data/raw")]
        data_dir: PathBuf,
        /// Maximum chunk size in characters.
        #[arg(long, default_value_t = 512)]
        chunk_size: usize,
        /// Overlap between consecutive chunks in characters.
        #[arg(long, default_value_t = 50)]
        chunk_overlap: usize,
        /// Chunks embedded per provider call.
        #[arg(long, default_value_t = legal_rag::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Ask one question against a saved index.
    Query {
        question: String,
        /// Number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum similarity for a chunk to be used.
        #[arg(long, default_value_t = 0.0)]
        threshold: f32,
        /// Do not print sources.
        #[arg(long)]
        no_sources: bool,
        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "LEGAL_RAG_HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "LEGAL_RAG_PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Print statistics about a saved index.
    Stats,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::BuildIndex { data_dir, chunk_size, chunk_overlap, batch_size } => {
            commands::build_index(&cli.index, &data_dir, chunk_size, chunk_overlap, batch_size)
                .await
        }
        Command::Query { question, top_k, threshold, no_sources, json } => {
            commands::query(&cli.index, question, top_k, threshold, !no_sources, json).await
        }
        Command::Serve { host, port } => commands::serve(&cli.index, host, port).await,
        Command::Stats => commands::stats(&cli.index).await,
    }
}
