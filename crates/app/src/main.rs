use chrono::Utc;
use clap::{Parser, Subcommand};
use rerank_search_core::{
    load_chunk_file, ChatCompletionGenerator, ChatConfig, ChunkStore, CrossEncoderConfig,
    HttpCrossEncoder, MemoryChunkStore, PipelineConfig, QdrantStore, SearchCoordinator,
    SearchOutcome,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PREVIEW_CHARS: usize = 150;

#[derive(Parser)]
#[command(name = "rerank-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "rag_collection_demo")]
    qdrant_collection: String,

    /// API key for the query expansion model; expansion degrades without it
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OpenAI-compatible chat completions endpoint
    #[arg(
        long,
        env = "EXPANSION_URL",
        default_value = rerank_search_core::clients::chat::DEFAULT_CHAT_ENDPOINT
    )]
    expansion_url: String,

    /// Model used for query expansion
    #[arg(
        long,
        env = "EXPANSION_MODEL",
        default_value = rerank_search_core::clients::chat::DEFAULT_CHAT_MODEL
    )]
    expansion_model: String,

    /// Base URL of the cross-encoder server; ranking degrades without it.
    /// All candidates are scored in one request: start TEI with
    /// `--max-client-batch-size` >= max-variants * fanout (100 by default)
    #[arg(long, env = "RERANKER_URL")]
    reranker_url: Option<String>,

    /// Cross-encoder model name
    #[arg(
        long,
        env = "RERANKER_MODEL",
        default_value = rerank_search_core::clients::cross_encoder::DEFAULT_RERANKER_MODEL
    )]
    reranker_model: String,
}

#[derive(Subcommand)]
enum Command {
    /// Load a chunk file and upsert it into the Qdrant collection.
    Index {
        /// JSON chunk file written by the chunker.
        #[arg(long, default_value = "semantic_chunks.json")]
        chunks: PathBuf,
    },
    /// Expand, retrieve, deduplicate and rerank evidence for a question.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of results to return.
        #[arg(long, env = "RERANK_TOP_K", default_value = "8")]
        top_k: usize,
        /// Candidates requested per query variant.
        #[arg(long, env = "VARIANT_FANOUT_LIMIT", default_value = "25")]
        fanout: usize,
        /// Maximum query variants, original included.
        #[arg(long, env = "MAX_VARIANTS", default_value = "4")]
        max_variants: usize,
        /// Search only the original query.
        #[arg(long, default_value_t = false)]
        no_expand: bool,
        /// Overall time budget in seconds.
        #[arg(long, env = "SEARCH_TIMEOUT_SECS", default_value = "60")]
        timeout_secs: u64,
        /// Search a chunk file in memory instead of Qdrant.
        #[arg(long)]
        chunks: Option<PathBuf>,
        /// Print evidence as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(error) = dotenv {
        if !error.not_found() {
            warn!(error = %error, "could not read .env file");
        }
    }

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "rerank-search boot"
    );

    match &cli.command {
        Command::Index { chunks } => {
            let loaded = load_chunk_file(chunks)
                .map_err(|error| anyhow::anyhow!("{}: {error}", chunks.display()))?;
            info!(path = %chunks.display(), chunk_count = loaded.len(), "indexing chunks");

            let store = QdrantStore::new(&cli.qdrant_url, &cli.qdrant_collection);
            store.ensure_collection().await?;
            store.upsert_chunks(&loaded).await?;

            println!(
                "{} chunks indexed into '{}' at {}",
                loaded.len(),
                store.collection(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Search {
            query,
            top_k,
            fanout,
            max_variants,
            no_expand,
            timeout_secs,
            chunks,
            json,
        } => {
            let config = PipelineConfig {
                variant_fanout_limit: *fanout,
                top_k: *top_k,
                max_variants: if *no_expand { 1 } else { *max_variants },
                pipeline_timeout: Duration::from_secs(*timeout_secs),
                ..PipelineConfig::default()
            };

            let outcome = match chunks {
                Some(path) => {
                    let loaded = load_chunk_file(path)
                        .map_err(|error| anyhow::anyhow!("{}: {error}", path.display()))?;
                    run_search(&cli, MemoryChunkStore::new(loaded), config, query).await?
                }
                None => {
                    let store = QdrantStore::new(&cli.qdrant_url, &cli.qdrant_collection);
                    run_search(&cli, store, config, query).await?
                }
            };

            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome.evidence())?);
            } else {
                print_outcome(&outcome);
            }
        }
    }

    Ok(())
}

async fn run_search<S>(
    cli: &Cli,
    store: S,
    config: PipelineConfig,
    query: &str,
) -> anyhow::Result<SearchOutcome>
where
    S: ChunkStore + Send + Sync,
{
    let generator = ChatCompletionGenerator::new(ChatConfig {
        endpoint: cli.expansion_url.clone(),
        api_key: cli.api_key.clone(),
        model: cli.expansion_model.clone(),
        timeout: config.expansion_timeout,
        ..ChatConfig::default()
    });
    if config.expansion_enabled() && !generator.is_configured() {
        warn!("no API key configured, query expansion will be skipped");
    }

    if cli.reranker_url.is_some() {
        info!(
            max_candidates = config.max_candidates(),
            "reranker must accept this many passages per request (TEI --max-client-batch-size)"
        );
    }

    let scorer = HttpCrossEncoder::new(CrossEncoderConfig {
        endpoint: cli.reranker_url.clone(),
        model: cli.reranker_model.clone(),
        timeout: config.rerank_timeout,
    });

    let coordinator = SearchCoordinator::new(store, generator, scorer, config)?;
    Ok(coordinator.search(query).await)
}

fn print_outcome(outcome: &SearchOutcome) {
    println!("query: {}", outcome.query);
    if outcome.is_empty() {
        println!("No relevant information found.");
        return;
    }

    if outcome.is_ranking_degraded() {
        println!("note: reranking unavailable, results are unranked");
    }
    for degradation in &outcome.degradations {
        println!("degraded: {degradation:?}");
    }

    for result in &outcome.results {
        let meta = &result.chunk.metadata;
        println!("Rank {} (Score: {:.4}):", result.rank, result.relevance_score);
        println!(
            "   page={} source={} section={} chunk={}",
            meta.page, meta.source, meta.section_title, result.chunk.id
        );
        let preview: String = result.chunk.text.chars().take(PREVIEW_CHARS).collect();
        println!("   {preview}...");
        println!("{}", "-".repeat(40));
    }
}
