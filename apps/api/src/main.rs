mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod parser;
mod pipeline;
mod routes;
mod standardizer;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreBackend};
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::LlmClient;
use crate::parser::extractor::DocumentExtractor;
use crate::parser::ResumeParser;
use crate::pipeline::staging::StagingArea;
use crate::pipeline::Pipeline;
use crate::routes::build_router;
use crate::standardizer::Standardizer;
use crate::state::AppState;
use crate::store::memory::MemoryCollection;
use crate::store::postgres::PgCollection;
use crate::store::{DocumentCollection, StoreManager};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume pipeline v{}", env!("CARGO_PKG_VERSION"));

    // Document store
    let collection: Arc<dyn DocumentCollection> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgCollection::new(pool))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; stored resumes are lost on restart");
            Arc::new(MemoryCollection::default())
        }
    };

    // LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())
        .context("Failed to build LLM client")?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Staging area
    let staging = StagingArea::new(&config.staging_dir);
    staging
        .prepare()
        .with_context(|| format!("Cannot create staging area at {}", config.staging_dir.display()))?;
    info!(
        "Staging area at {} (keep raw responses: {})",
        config.staging_dir.display(),
        config.keep_raw_responses
    );

    let pipeline = Pipeline::new(
        ResumeParser::new(Arc::new(DocumentExtractor)),
        Standardizer::new(Arc::new(llm)),
        StoreManager::new(collection),
        staging,
        config.keep_raw_responses,
    );

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the upload UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
