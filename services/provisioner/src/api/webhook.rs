//! GitHub webhook intake.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ghr_github::{EVENT_HEADER, SIGNATURE_HEADER};
use serde::Serialize;
use tracing::info;

use crate::admission::{Admission, AdmissionReason, Delivery};
use crate::api::error::ApiError;
use crate::api::request_context::{client_ip, header_str, read_body_limited};
use crate::state::AppState;

/// Largest accepted webhook body.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct WebhookResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i64>,
}

pub async fn receive(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let caller = client_ip(&parts);
    let body = read_body_limited(&parts, body, MAX_WEBHOOK_BODY_BYTES).await?;

    let delivery = Delivery {
        event_type: header_str(&parts.headers, EVENT_HEADER),
        signature: header_str(&parts.headers, SIGNATURE_HEADER),
        client_ip: &caller,
        body: &body,
    };

    match state.admission().admit(delivery) {
        Admission::Admitted(job) => {
            let job_id = job.event.job_id();
            info!(
                job_id,
                repo = %job.event.repo_full_name(),
                in_flight = state.admission().gate().in_use(),
                "Accepted workflow job"
            );
            state.orchestrator().spawn(job);

            Ok((
                StatusCode::ACCEPTED,
                Json(WebhookResponse {
                    status: "accepted".to_string(),
                    reason: None,
                    job_id: Some(job_id),
                }),
            )
                .into_response())
        }
        Admission::Rejected(reason) if reason.is_ignored() => Ok((
            StatusCode::OK,
            Json(WebhookResponse {
                status: "ignored".to_string(),
                reason: Some(reason.as_str().to_string()),
                job_id: None,
            }),
        )
            .into_response()),
        Admission::Rejected(reason) => Err(rejection(reason)),
    }
}

fn rejection(reason: AdmissionReason) -> ApiError {
    match reason {
        AdmissionReason::Unauthenticated => {
            ApiError::unauthorized("invalid_signature", "Webhook signature verification failed")
        }
        AdmissionReason::Malformed => {
            ApiError::bad_request("malformed_payload", "Payload is not a valid workflow_job event")
        }
        AdmissionReason::RateLimited => {
            ApiError::too_many_requests("rate_limited", "Repository rate limit exceeded")
        }
        AdmissionReason::CapacityExhausted => {
            ApiError::service_unavailable("capacity_exhausted", "Provisioning pool is full")
        }
        other => ApiError::internal("unexpected_admission", other.as_str()),
    }
}
