mod config;
mod db;
mod documents;
mod errors;
mod llm_client;
mod placeholders;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StorageBackend};
use crate::db::{create_pool, run_migrations};
use crate::documents::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Placeholder API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize document storage
    let store: Arc<dyn DocumentStore> = match &config.storage {
        StorageBackend::Postgres { database_url } => {
            let pool = create_pool(database_url).await?;
            run_migrations(&pool).await?;
            Arc::new(PgDocumentStore::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory document storage; data is lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    // Initialize LLM client
    let model = Arc::new(LlmClient::new());
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    if config.anthropic_api_key.is_none() {
        warn!("ANTHROPIC_API_KEY is not set; requests must supply their own api_key");
    }
    info!(
        "Conversation window: {} turns",
        config.conversation_window
    );

    // Build app state
    let state = AppState {
        store,
        model,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
