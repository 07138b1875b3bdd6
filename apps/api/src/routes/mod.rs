pub mod health;

use axum::{routing::get, routing::post, Router};

use crate::letter::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Cover Letter API
        .route("/api/v1/cover-letters/draft", post(handlers::handle_draft))
        .route("/api/v1/cover-letters/source", post(handlers::handle_source))
        .route("/api/v1/cover-letters/pdf", post(handlers::handle_pdf))
        .route(
            "/api/v1/cover-letters/pdf/upload",
            post(handlers::handle_pdf_upload),
        )
        .with_state(state)
}
