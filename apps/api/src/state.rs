use std::sync::Arc;

use crate::config::Config;
use crate::documents::store::DocumentStore;
use crate::llm_client::StructuredModel;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres or in-memory, chosen by `STORAGE_BACKEND`.
    pub store: Arc<dyn DocumentStore>,
    /// Model seam. Default: `LlmClient` against the Anthropic API.
    pub model: Arc<dyn StructuredModel>,
    pub config: Config,
}
