//! Self-destruct callback from finished workers.

use axum::{
    extract::{Request, State},
    Json,
};
use ghr_cloud::{InstanceId, ProviderError};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use crate::api::error::ApiError;
use crate::api::request_context::{client_ip, header_str, read_body_limited};
use crate::state::AppState;

pub const CALLBACK_SECRET_HEADER: &str = "X-Callback-Secret";

/// Largest accepted callback body.
pub const MAX_CALLBACK_BODY_BYTES: usize = 1024;

#[derive(Debug, Deserialize)]
pub struct DestroyRequest {
    pub droplet_id: i64,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct DestroyResponse {
    pub status: String,
    pub droplet_id: u64,
}

fn secret_matches(expected: &str, provided: &str) -> bool {
    !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
}

pub async fn destroy(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<DestroyResponse>, ApiError> {
    let (parts, body) = request.into_parts();
    let caller = client_ip(&parts);
    let settings = state.callback();

    let provided = header_str(&parts.headers, CALLBACK_SECRET_HEADER).unwrap_or_default();
    if !secret_matches(settings.secret.expose(), provided) {
        warn!(target: "security", client_ip = %caller, "Invalid callback secret");
        return Err(ApiError::unauthorized(
            "invalid_callback_secret",
            "Callback secret verification failed",
        ));
    }

    let body = read_body_limited(&parts, body, MAX_CALLBACK_BODY_BYTES).await?;
    let payload: DestroyRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(client_ip = %caller, error = %e, "Malformed callback payload");
        ApiError::bad_request("malformed_payload", "Body must be {\"droplet_id\": <integer>}")
    })?;

    let id = match u64::try_from(payload.droplet_id) {
        Ok(id) if id > 0 => InstanceId(id),
        _ => {
            return Err(ApiError::bad_request(
                "invalid_droplet_id",
                "droplet_id must be a positive integer",
            ))
        }
    };

    let delete = tokio::time::timeout(settings.timeout, state.provider().delete_instance(id)).await;
    match delete {
        Ok(Ok(())) | Ok(Err(ProviderError::NotFound(_))) => {
            info!(instance_id = %id, client_ip = %caller, "Destroyed runner instance on callback");
            Ok(Json(DestroyResponse {
                status: "deleted".to_string(),
                droplet_id: id.0,
            }))
        }
        Ok(Err(e)) => {
            error!(instance_id = %id, error = %e, "Failed to delete runner instance");
            Err(ApiError::internal("delete_failed", "Failed to delete instance"))
        }
        Err(_) => {
            error!(
                instance_id = %id,
                timeout_secs = settings.timeout.as_secs(),
                "Timed out deleting runner instance"
            );
            Err(ApiError::internal("delete_timeout", "Timed out deleting instance"))
        }
    }
}
