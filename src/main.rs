use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragchat::chat::{ChatRequest, ChatService};
use ragchat::config::{self, Config};
use ragchat::embedding::create_embedder;
use ragchat::engine::RetrievalEngine;
use ragchat::extract::PdfExtractor;
use ragchat::history::MemoryHistoryStore;
use ragchat::provider::ProviderRegistry;
use ragchat::store::FsBlobStore;
use ragchat::websearch::WebSearcher;

#[derive(Parser)]
#[command(name = "ragchat", about = "Per-conversation retrieval-augmented chat", version)]
struct Cli {
    /// Path to a TOML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a PDF into a conversation scope.
    Ingest {
        file: PathBuf,
        #[arg(long)]
        scope: String,
        /// Logical filename recorded in metadata; defaults to the file name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Retrieve the passages nearest to a query.
    Query {
        query: String,
        #[arg(long)]
        scope: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show ingested document metadata for a scope.
    Docs {
        #[arg(long)]
        scope: String,
    },
    /// Run one chat exchange.
    Chat {
        message: String,
        #[arg(long)]
        scope: Option<String>,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Include web search results in the prompt.
        #[arg(long)]
        web: bool,
    },
    /// List models offered by a configured provider.
    Models { provider: String },
}

fn load(cli_config: &Option<PathBuf>) -> Result<Config> {
    match cli_config {
        Some(path) => config::load_config(path),
        None => Ok(Config::default()),
    }
}

fn build_engine(config: &Config) -> Result<Arc<RetrievalEngine>> {
    let embedder = Arc::from(create_embedder(&config.embedding)?);
    let store = Arc::new(FsBlobStore::new(config.store.dir.clone()));
    Ok(Arc::new(RetrievalEngine::new(
        embedder,
        Arc::new(PdfExtractor),
        store,
        config.chunking,
        config.retrieval.cached_scopes,
    )))
}

fn build_service(config: &Config) -> Result<ChatService> {
    let engine = build_engine(config)?;
    let providers = ProviderRegistry::from_config(config)?;
    let web = WebSearcher::new(&config.websearch)?;
    Ok(ChatService::new(
        engine,
        providers,
        Arc::new(MemoryHistoryStore::new()),
        web,
        config,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load(&cli.config)?;

    match cli.command {
        Commands::Ingest { file, scope, name } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = name.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string())
            });
            let engine = build_engine(&config)?;
            let summary = engine.ingest(&bytes, &scope, &filename).await?;
            println!(
                "Ingested {}: {} pages, {} chunks ({} total in scope)",
                summary.filename, summary.pages, summary.chunks, summary.total_chunks
            );
        }
        Commands::Query { query, scope, top_k } => {
            let engine = build_engine(&config)?;
            let k = top_k.unwrap_or(config.retrieval.top_k);
            let result = engine.retrieve(&query, &scope, k).await?;
            if result.passages.is_empty() {
                println!("No context found in scope '{scope}'");
            }
            for (passage, citation) in result.passages.iter().zip(&result.citations) {
                println!(
                    "[{}] {} (page {:?}, chunk {})",
                    citation.id, citation.source_file, citation.page, citation.chunk_index
                );
                println!("{passage}\n");
            }
        }
        Commands::Docs { scope } => {
            let engine = build_engine(&config)?;
            let metadata = engine.document_metadata(&scope).await?;
            if metadata.files.is_empty() {
                println!("No documents in scope '{scope}'");
            }
            for (filename, record) in &metadata.files {
                println!(
                    "{filename}: {} pages, {} chunks (added {}, updated {})",
                    record.pages, record.chunks, record.added_at, record.updated_at
                );
            }
            println!("Total chunks: {}", metadata.total_chunks);
        }
        Commands::Chat {
            message,
            scope,
            provider,
            model,
            web,
        } => {
            let service = build_service(&config)?;
            let response = service
                .chat(ChatRequest {
                    scope,
                    message,
                    provider,
                    model,
                    system_prompt: None,
                    use_web: web,
                })
                .await?;
            println!("{}", response.message);
            if !response.citations.is_empty() {
                println!();
                for citation in &response.citations {
                    println!(
                        "[{}] {} (chunk {})",
                        citation.id, citation.source_file, citation.chunk_index
                    );
                }
            }
            for result in &response.web_results {
                println!("- {} ({})", result.title, result.url);
            }
        }
        Commands::Models { provider } => {
            let service = build_service(&config)?;
            for model in service.list_models(&provider).await? {
                println!("{model}");
            }
        }
    }
    Ok(())
}
