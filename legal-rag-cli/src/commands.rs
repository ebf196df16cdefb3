use std::{path::Path, sync::Arc, time::Instant};

use anyhow::{Context, Result, bail};
use legal_rag::{
    EmbeddingProvider, FallbackGenerator, FlatIndex, Generator, HashingEmbedder, QueryOptions,
    RagConfig, RagService, VectorIndex, hashing::DEFAULT_DIMENSIONS,
};
use legal_rag_server::{ServerConfig, run_server};
use tracing::{info, warn};

use crate::{EmbedderKind, IndexArgs};

fn embedder(args: &IndexArgs) -> Result<Arc<dyn EmbeddingProvider>> {
    match args.embedder {
        EmbedderKind::Hashing => {
            let dimensions = args.dimensions.unwrap_or(DEFAULT_DIMENSIONS);
            if dimensions == 0 {
                bail!("--dimensions must be at least 1");
            }
            Ok(Arc::new(HashingEmbedder::new(dimensions)))
        }
        #[cfg(feature = "openai")]
        EmbedderKind::Openai => {
            let mut provider = legal_rag::OpenAIEmbeddingProvider::from_env()
                .context("the openai embedder needs OPENAI_API_KEY")?;
            match args.dimensions {
                Some(0) => bail!("--dimensions must be at least 1"),
                Some(dimensions) => provider = provider.with_dimensions(dimensions),
                None => {}
            }
            Ok(Arc::new(provider))
        }
        #[cfg(not(feature = "openai"))]
        EmbedderKind::Openai => bail!("this build does not include the openai feature"),
    }
}

/// A chat model when `OPENAI_API_KEY` is available, extractive answers otherwise.
fn generator(args: &IndexArgs, config: &RagConfig) -> Result<Arc<dyn Generator>> {
    #[cfg(feature = "openai")]
    if std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.is_empty()) {
        let chat_config =
            legal_rag::ChatConfig { model: args.chat_model.clone(), ..Default::default() };
        let timeout = std::time::Duration::from_secs(chat_config.request_timeout_secs);
        let chat = legal_rag::ChatCompletionGenerator::from_env(chat_config)?;
        info!(model = %args.chat_model, "using chat model for answers");
        let timeout = timeout.min(config.generation_timeout());
        return Ok(Arc::new(FallbackGenerator::new(Arc::new(chat), timeout)));
    }

    warn!("OPENAI_API_KEY not set, answers will be extractive");
    Ok(Arc::new(FallbackGenerator::extractive_only()))
}

async fn load_index(args: &IndexArgs) -> Result<Arc<FlatIndex>> {
    let index = FlatIndex::load(&args.index_path, &args.metadata_path).await.with_context(|| {
        format!(
            "cannot load index from {} and {}; run `legal-rag build-index` first",
            args.index_path.display(),
            args.metadata_path.display()
        )
    })?;
    Ok(Arc::new(index))
}

async fn service(args: &IndexArgs, config: RagConfig) -> Result<RagService> {
    let started = Instant::now();
    let index = load_index(args).await?;
    let generator = generator(args, &config)?;
    let service = RagService::builder()
        .config(config)
        .embedding_provider(embedder(args)?)
        .index(index)
        .generator(generator)
        .build()
        .context(
            "embedder does not match the saved index; \
             pass the same --embedder and --dimensions used to build it",
        )?;
    info!(
        index_size = service.index_size().await,
        load_secs = started.elapsed().as_secs_f64(),
        "service ready"
    );
    Ok(service)
}

pub async fn build_index(
    args: &IndexArgs,
    data_dir: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
    batch_size: usize,
) -> Result<()> {
    let config = RagConfig::builder().chunk_size(chunk_size).chunk_overlap(chunk_overlap).build()?;
    let embedder = embedder(args)?;

    let started = Instant::now();
    let (index, report) = legal_rag::build_index(data_dir, embedder.as_ref(), &config, batch_size)
        .await
        .with_context(|| format!("cannot build index from {}", data_dir.display()))?;
    if report.chunks == 0 {
        warn!(directory = %data_dir.display(), "no chunks produced; the saved index is empty");
    }

    index.save(&args.index_path, &args.metadata_path).await?;

    // Re-load to make sure the pair on disk is usable.
    let reloaded = FlatIndex::load(&args.index_path, &args.metadata_path).await?;
    if reloaded.len().await != report.chunks {
        bail!("saved index holds {} entries, expected {}", reloaded.len().await, report.chunks);
    }

    println!("Documents loaded:  {}", report.documents);
    println!("Documents skipped: {}", report.skipped);
    println!("Chunks indexed:    {}", report.chunks);
    println!("Embedding model:   {} ({} dims)", embedder.name(), embedder.dimensions());
    println!("Index file:        {}", args.index_path.display());
    println!("Metadata file:     {}", args.metadata_path.display());
    println!("Elapsed:           {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

pub async fn query(
    args: &IndexArgs,
    question: String,
    top_k: Option<usize>,
    threshold: f32,
    return_sources: bool,
    json: bool,
) -> Result<()> {
    let config = RagConfig::builder().similarity_threshold(threshold).build()?;
    let service = service(args, config).await?;

    let mut options =
        QueryOptions::new(question).return_sources(return_sources).return_metadata(true);
    options.top_k = top_k;
    let response = service.query(&options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Q: {}\n", response.question);
    println!("{}\n", response.answer);
    if let Some(sources) = &response.sources {
        for (i, source) in sources.iter().enumerate() {
            println!(
                "[{}] {} #{} (score {:.3})\n    {}",
                i + 1,
                source.source_file,
                source.chunk_id,
                source.similarity_score,
                source.text
            );
        }
    }
    if let Some(metadata) = &response.metadata {
        println!(
            "\nretrieval {:.3}s | generation {:.3}s | total {:.3}s",
            metadata.retrieval_time, metadata.generation_time, metadata.total_time
        );
        if let Some(reason) = &metadata.fallback_reason {
            println!("fallback: {reason}");
        }
    }
    Ok(())
}

pub async fn serve(args: &IndexArgs, host: String, port: u16) -> Result<()> {
    let service = service(args, RagConfig::default()).await?;
    run_server(ServerConfig { host, port }, Arc::new(service)).await
}

pub async fn stats(args: &IndexArgs) -> Result<()> {
    let index = load_index(args).await?;
    let metadata = tokio::fs::metadata(&args.index_path).await?;
    println!("Entries:    {}", index.len().await);
    println!("Dimensions: {}", index.dimensions());
    println!("Index type: flat (exact inner product)");
    println!("Index size: {} bytes", metadata.len());
    Ok(())
}
