//! Seed the vector store with a few sample hooks.
//!
//! Usage:
//!   cargo run --bin seed
//!
//! Requires USE_VECTOR_STORE=true and a reachable Qdrant; in memory mode
//! there is nothing durable to seed, so the tool just says so and exits.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hookgen::config::Config;
use hookgen::embeddings::EmbedBackend;
use hookgen::model::{Hook, HookStyle};
use hookgen::store::{StoreBackend, VectorStore};

#[derive(Parser)]
#[command(name = "seed")]
#[command(about = "Seed the vector store with sample hooks")]
struct Cli {
    /// Path to config.yml
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

fn sample_hooks() -> Vec<Hook> {
    let mut hooks = vec![
        Hook::new(
            "photosynthesis",
            HookStyle::Meme,
            "Plants: turning ☀️ into 🍃 power—solar panels with vibes.".to_string(),
        ),
        Hook::new(
            "algebra fractions",
            HookStyle::Analogy,
            "Fractions are pizza slices—same pizza, different cut sizes.".to_string(),
        ),
        Hook::new(
            "gravity",
            HookStyle::Story,
            "You're an astronaut; everything floats—until gravity says 'come home.'".to_string(),
        ),
    ];
    for hook in &mut hooks {
        hook.tags = vec!["seed".to_string()];
    }
    hooks
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("seed=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => Config::load_from_file(path),
        None => Config::new(),
    };

    if !config.use_vector_store {
        println!(
            "USE_VECTOR_STORE=false — run the server to collect data in memory by generating hooks."
        );
        return Ok(());
    }

    let embedder = EmbedBackend::from_provider(&config.embedding_provider);
    let store = StoreBackend::Vector(
        VectorStore::connect(
            &config.qdrant_url,
            embedder,
            config.allow_destructive_reindex,
        )
        .await?,
    );

    for hook in sample_hooks() {
        let saved = store.save_hook(hook).await;
        match saved.id {
            Some(id) => info!("Seeded: {} ({})", saved.topic, id),
            None => anyhow::bail!("failed to seed '{}'", saved.topic),
        }
    }

    println!("Done.");
    Ok(())
}
