//! HTTP API handlers and routing.

pub mod callback;
pub mod error;
mod health;
pub mod request_context;
pub mod webhook;

use std::time::Duration;

use axum::{routing::post, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::api::error::ApiError;
use crate::state::AppState;

/// Upper bound on handling a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Create the router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .route("/webhook", post(webhook::receive))
        .route("/callback/destroy", post(callback::destroy))
        .method_not_allowed_fallback(|| async { ApiError::method_not_allowed() })
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}
