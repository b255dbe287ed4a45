//! HTTP API of the tracking backend.
//!
//! Collection triggers, session management and read-only views over stored
//! measures. All failures answer with an [`telemesh_core::ErrorBody`].

pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

pub use state::AppState;

pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/collect", post(handlers::collect))
        .route("/api/latest", get(handlers::latest))
        .route("/api/sessions", post(handlers::create_session))
        .route("/api/sessions/:session_id", get(handlers::get_session))
        .route("/api/sessions/:session_id/select", post(handlers::select_session))
        .route("/api/sessions/:session_id/measures", get(handlers::session_measures))
        .route("/api/sessions/:session_id/latest", get(handlers::session_latest))
        .route("/api/owners/:owner_id/sessions", get(handlers::owner_sessions))
        .with_state(state)
}
