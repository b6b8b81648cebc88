pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::documents::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Documents API
        .route(
            "/api/v1/documents",
            post(handlers::handle_create_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/documents/:id", get(handlers::handle_get_document))
        .route(
            "/api/v1/documents/:id/messages",
            post(handlers::handle_send_message),
        )
        .route(
            "/api/v1/documents/:id/placeholders",
            patch(handlers::handle_bulk_update),
        )
        .route(
            "/api/v1/documents/:id/conversation",
            get(handlers::handle_get_conversation),
        )
        .with_state(state)
}
