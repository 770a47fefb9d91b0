//! Health check endpoint.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Current timestamp (RFC 3339).
    pub timestamp: String,
    /// Provisioning tasks currently holding a slot.
    pub in_flight: usize,
    pub capacity: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let gate = state.admission().gate();
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "ghr-provisioner".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        in_flight: gate.in_use(),
        capacity: gate.capacity(),
    })
}
