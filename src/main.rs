//! hookgen API server.
//!
//! Loads configuration, resolves the store/embedding/model backends once,
//! and serves the HTTP surface. Every optional dependency degrades rather
//! than aborting startup: a missing graph export means empty lookups, an
//! unreachable Qdrant means the in-memory store, a missing API key means
//! template-only generation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hookgen::config::Config;
use hookgen::embeddings::EmbedBackend;
use hookgen::generator::Orchestrator;
use hookgen::graphrag::GraphIndex;
use hookgen::llm::{LlmBackend, LlmClient};
use hookgen::server::{self, AppState};
use hookgen::store::{StoreBackend, VectorStore};

#[derive(Parser)]
#[command(name = "hookgen")]
#[command(about = "Educational hook & quiz generator API")]
struct Cli {
    /// Path to config.yml (defaults to ./config.yml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen port (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hookgen=info".parse()?))
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config {
        Some(path) => Config::load_from_file(path),
        None => Config::new(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }

    let graph = Arc::new(GraphIndex::load(&config.graph_index_dir));
    let store = Arc::new(build_store(&config).await);
    let llm = build_llm(&config);

    info!(
        "Starting with store={}, llm={}, graph_loaded={}",
        store.backend_name(),
        if llm.is_enabled() { "openai" } else { "disabled" },
        graph.is_loaded()
    );

    let orchestrator = Orchestrator::new(
        llm,
        Arc::clone(&graph),
        Arc::clone(&store),
        config.request_timeout,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState {
        config,
        orchestrator,
        graph,
        store,
    });

    tokio::select! {
        result = server::serve(state, addr) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

/// Resolve the store backend. Vector-store init failures fall back to
/// the in-memory store; the server starts either way.
async fn build_store(config: &Config) -> StoreBackend {
    if config.use_vector_store {
        let embedder = EmbedBackend::from_provider(&config.embedding_provider);
        match VectorStore::connect(
            &config.qdrant_url,
            embedder,
            config.allow_destructive_reindex,
        )
        .await
        {
            Ok(store) => {
                info!("Vector store connected at {}", config.qdrant_url);
                return StoreBackend::Vector(store);
            }
            Err(err) => {
                error!("Vector store init failed; falling back to memory: {err:#}");
            }
        }
    }
    StoreBackend::in_memory()
}

/// Resolve the language-model backend once at startup.
fn build_llm(config: &Config) -> LlmBackend {
    if !config.use_language_model {
        return LlmBackend::Disabled;
    }
    match LlmClient::from_env(config.request_timeout) {
        Ok(client) => LlmBackend::OpenAi(
            client
                .with_model(config.llm_model.clone())
                .with_sampling(config.llm_temperature, config.llm_max_tokens),
        ),
        Err(err) => {
            warn!("Language model requested but unavailable ({err}); using templates");
            LlmBackend::Disabled
        }
    }
}
