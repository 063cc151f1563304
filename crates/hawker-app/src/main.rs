//! Hawker application binary - composition root.
//!
//! Ties together all Hawker crates into a single executable:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Open the SQLite session store
//! 3. Build the product index and seed it from the catalog file
//! 4. Construct the language model client and optional web search provider
//! 5. Start the axum REST API server

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use hawker_api::{start_server, AppState};
use hawker_chat::DialogueOrchestrator;
use hawker_core::config::HawkerConfig;
use hawker_core::types::Product;
use hawker_llm::{HttpLlmClient, LlmClient};
use hawker_search::{
    EmbeddingService, HashEmbedding, HttpWebSearch, ProductIndex, WebSearchProvider,
};
use hawker_session::{Database, SqliteSessionStore};

use cli::CliArgs;

/// Flatten a product into a single text document for embedding.
///
/// Name, brand, and attribute pairs all contribute, so a query like
/// "camera tốt" can reach a product whose camera lives in an attribute.
fn product_document(product: &Product) -> String {
    let mut parts = vec![product.name.clone(), product.brand.clone()];
    for (key, value) in &product.attributes {
        parts.push(format!("{} {}", key, value));
    }
    parts.join(" ")
}

/// Load the product catalog from a JSON file and index every entry.
///
/// The file holds a JSON array of products. Returns the number indexed.
async fn seed_catalog(
    index: &ProductIndex,
    embedding: &HashEmbedding,
    path: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let products: Vec<Product> = serde_json::from_str(&raw)?;

    let mut count = 0;
    for product in products {
        let document = product_document(&product);
        let vector = embedding.embed(&document).await?;
        index.insert(product, vector)?;
        count += 1;
    }
    Ok(count)
}

/// Expand ~ to home directory in a path string.
fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is loaded before tracing so the configured level can apply.
    let config_file = args.resolve_config_path();
    let mut config = HawkerConfig::load_or_default(&config_file);
    config.server.port = args.resolve_port(config.server.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }

    // Tracing. --log-level beats RUST_LOG beats the config file.
    let filter = match args.resolve_log_level() {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.general.log_level.clone())),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Hawker v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Data directory.
    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    // Session store.
    let db_path = expand_home(&config.session.db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(Database::new(&db_path)?);
    let store = Arc::new(SqliteSessionStore::new(db));
    tracing::info!(path = %db_path.display(), "SQLite session store opened");

    // Product index, seeded from the catalog file when present.
    let embedding = Arc::new(HashEmbedding::new(config.search.embedding_dim));
    let index = ProductIndex::new();
    let catalog_path = data_dir.join("products.json");
    if catalog_path.exists() {
        match seed_catalog(&index, &embedding, &catalog_path).await {
            Ok(count) => {
                tracing::info!(count, path = %catalog_path.display(), "Product catalog indexed")
            }
            Err(e) => {
                tracing::error!(path = %catalog_path.display(), error = %e, "Failed to load product catalog");
                return Err(e);
            }
        }
    } else {
        tracing::warn!(path = %catalog_path.display(), "No product catalog found, starting with an empty index");
    }

    // Language model client.
    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(&config.llm)?);
    tracing::info!(model = %config.llm.model, "Language model client ready");

    // Optional web search augmentation.
    let web: Option<Arc<dyn WebSearchProvider>> =
        if config.web_search.enabled && !config.web_search.base_url.is_empty() {
            match HttpWebSearch::new(&config.web_search) {
                Ok(provider) => {
                    tracing::info!(base_url = %config.web_search.base_url, "Web search enabled");
                    Some(Arc::new(provider))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Web search unavailable, continuing without it");
                    None
                }
            }
        } else {
            tracing::info!("Web search disabled in config");
            None
        };

    // Dialogue engine.
    let orchestrator = Arc::new(DialogueOrchestrator::new(
        store,
        llm,
        embedding,
        web,
        index.clone(),
        &config,
    ));
    tracing::info!("Dialogue engine ready");

    // API server (blocks until shutdown).
    let state = AppState::new(orchestrator, index, config.clone());
    start_server(&config, state).await?;

    Ok(())
}
