//! Webhook admission.
//!
//! A delivery passes these checks in order, and the first failure wins:
//!
//! 1. HMAC signature over the raw body
//! 2. Event type is `workflow_job`
//! 3. Payload parses
//! 4. Action is `queued`
//! 5. A label matches the required label (ASCII case-insensitive)
//! 6. Per-repository rate limit
//! 7. A free concurrency slot
//!
//! Method and body-size checks happen in the HTTP layer before this runs.
//! Only in-memory state is touched here; nothing in admission awaits.

pub mod gate;
pub mod rate_limit;

use std::fmt;

use ghr_github::{
    verify_webhook_signature, JobAction, SecretToken, WorkflowJobEvent, WORKFLOW_JOB_EVENT,
};
use tracing::{debug, warn};

pub use gate::{ConcurrencyGate, ConcurrencySlot};
pub use rate_limit::RepoRateLimiter;

/// Why a delivery was admitted or turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionReason {
    Unauthenticated,
    WrongEvent,
    Malformed,
    WrongAction,
    LabelMismatch,
    RateLimited,
    CapacityExhausted,
    Admitted,
}

impl AdmissionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionReason::Unauthenticated => "unauthenticated",
            AdmissionReason::WrongEvent => "wrong_event",
            AdmissionReason::Malformed => "malformed_payload",
            AdmissionReason::WrongAction => "wrong_action",
            AdmissionReason::LabelMismatch => "label_mismatch",
            AdmissionReason::RateLimited => "rate_limited",
            AdmissionReason::CapacityExhausted => "capacity_exhausted",
            AdmissionReason::Admitted => "admitted",
        }
    }

    /// Deliveries that are acknowledged but silently dropped.
    pub fn is_ignored(&self) -> bool {
        matches!(
            self,
            AdmissionReason::WrongEvent
                | AdmissionReason::WrongAction
                | AdmissionReason::LabelMismatch
        )
    }
}

impl fmt::Display for AdmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub admitted: bool,
    pub reason: AdmissionReason,
}

impl From<AdmissionReason> for AdmissionDecision {
    fn from(reason: AdmissionReason) -> Self {
        Self {
            admitted: reason == AdmissionReason::Admitted,
            reason,
        }
    }
}

/// An event cleared for provisioning, holding its concurrency slot.
#[derive(Debug)]
pub struct AdmittedJob {
    pub event: WorkflowJobEvent,
    pub slot: ConcurrencySlot,
}

#[derive(Debug)]
pub enum Admission {
    Admitted(AdmittedJob),
    Rejected(AdmissionReason),
}

impl Admission {
    pub fn decision(&self) -> AdmissionDecision {
        match self {
            Admission::Admitted(_) => AdmissionReason::Admitted.into(),
            Admission::Rejected(reason) => (*reason).into(),
        }
    }
}

/// A webhook delivery as received, before any parsing.
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    pub event_type: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub client_ip: &'a str,
    pub body: &'a [u8],
}

/// Admission settings.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub webhook_secret: SecretToken,
    pub required_label: String,
    pub max_per_repo_per_window: usize,
    pub max_concurrent: usize,
}

/// Filters, rate-limits and bounds concurrency of webhook deliveries.
///
/// Owns its limiter and gate, so separate controllers never share state.
#[derive(Debug)]
pub struct AdmissionController {
    webhook_secret: SecretToken,
    required_label: String,
    rate_limiter: RepoRateLimiter,
    gate: ConcurrencyGate,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self::with_parts(
            config.webhook_secret,
            config.required_label,
            RepoRateLimiter::per_minute(config.max_per_repo_per_window),
            ConcurrencyGate::new(config.max_concurrent),
        )
    }

    pub fn with_parts(
        webhook_secret: SecretToken,
        required_label: String,
        rate_limiter: RepoRateLimiter,
        gate: ConcurrencyGate,
    ) -> Self {
        Self {
            webhook_secret,
            required_label,
            rate_limiter,
            gate,
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn rate_limiter(&self) -> &RepoRateLimiter {
        &self.rate_limiter
    }

    pub fn admit(&self, delivery: Delivery<'_>) -> Admission {
        let signature = delivery.signature.unwrap_or_default();
        if !verify_webhook_signature(
            delivery.body,
            signature,
            self.webhook_secret.expose().as_bytes(),
            delivery.client_ip,
        ) {
            return Admission::Rejected(AdmissionReason::Unauthenticated);
        }

        if delivery.event_type != Some(WORKFLOW_JOB_EVENT) {
            debug!(event_type = ?delivery.event_type, "Ignoring non workflow_job event");
            return Admission::Rejected(AdmissionReason::WrongEvent);
        }

        let event = match WorkflowJobEvent::from_slice(delivery.body) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    client_ip = %delivery.client_ip,
                    error = %e,
                    "Malformed workflow_job payload"
                );
                return Admission::Rejected(AdmissionReason::Malformed);
            }
        };

        if event.action != JobAction::Queued {
            debug!(job_id = event.job_id(), "Ignoring workflow_job action");
            return Admission::Rejected(AdmissionReason::WrongAction);
        }

        if !event.has_label(&self.required_label) {
            debug!(
                job_id = event.job_id(),
                required_label = %self.required_label,
                "Ignoring job without required label"
            );
            return Admission::Rejected(AdmissionReason::LabelMismatch);
        }

        let repo = event.repo_full_name();
        if !self.rate_limiter.check(repo) {
            warn!(
                target: "security",
                repo = %repo,
                client_ip = %delivery.client_ip,
                limit = self.rate_limiter.limit(),
                "Rate limit exceeded"
            );
            return Admission::Rejected(AdmissionReason::RateLimited);
        }

        match self.gate.try_acquire() {
            Some(slot) => Admission::Admitted(AdmittedJob { event, slot }),
            None => {
                warn!(
                    job_id = event.job_id(),
                    repo = %repo,
                    capacity = self.gate.capacity(),
                    "Worker pool full, rejecting job"
                );
                Admission::Rejected(AdmissionReason::CapacityExhausted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghr_github::signature::sign_payload;

    const SECRET: &str = "webhook-secret";

    fn controller(rate: usize, pool: usize) -> AdmissionController {
        AdmissionController::new(AdmissionConfig {
            webhook_secret: SecretToken::new(SECRET),
            required_label: "self-hosted".to_string(),
            max_per_repo_per_window: rate,
            max_concurrent: pool,
        })
    }

    fn payload(action: &str, labels: &[&str]) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "action": action,
            "workflow_job": { "id": 77, "name": "build", "labels": labels },
            "repository": {
                "full_name": "octo/widgets",
                "name": "widgets",
                "owner": { "login": "octo" }
            }
        }))
        .unwrap()
    }

    fn admit(controller: &AdmissionController, event_type: &str, body: &[u8]) -> Admission {
        let signature = sign_payload(body, SECRET.as_bytes()).unwrap();
        controller.admit(Delivery {
            event_type: Some(event_type),
            signature: Some(&signature),
            client_ip: "192.0.2.1",
            body,
        })
    }

    fn reason(admission: &Admission) -> AdmissionReason {
        admission.decision().reason
    }

    #[test]
    fn test_signature_checked_before_anything_else() {
        let controller = controller(10, 10);
        let body = b"not even json";
        let admission = controller.admit(Delivery {
            event_type: Some("workflow_job"),
            signature: None,
            client_ip: "192.0.2.1",
            body,
        });
        assert_eq!(reason(&admission), AdmissionReason::Unauthenticated);
    }

    #[test]
    fn test_other_event_types_are_ignored() {
        let controller = controller(10, 10);
        let admission = admit(&controller, "push", b"{}");
        assert_eq!(reason(&admission), AdmissionReason::WrongEvent);
        assert!(AdmissionReason::WrongEvent.is_ignored());
    }

    #[test]
    fn test_malformed_payload() {
        let controller = controller(10, 10);
        let admission = admit(&controller, "workflow_job", b"{\"action\":");
        assert_eq!(reason(&admission), AdmissionReason::Malformed);
    }

    #[test]
    fn test_non_queued_action_is_ignored() {
        let controller = controller(10, 10);
        let admission = admit(&controller, "workflow_job", &payload("completed", &["self-hosted"]));
        assert_eq!(reason(&admission), AdmissionReason::WrongAction);
    }

    #[test]
    fn test_label_mismatch_is_ignored() {
        let controller = controller(10, 10);
        let admission = admit(&controller, "workflow_job", &payload("queued", &["ubuntu-latest"]));
        assert_eq!(reason(&admission), AdmissionReason::LabelMismatch);
    }

    #[test]
    fn test_ignored_events_do_not_consume_rate_limit() {
        let controller = controller(1, 10);
        admit(&controller, "workflow_job", &payload("queued", &["ubuntu-latest"]));
        assert_eq!(controller.rate_limiter().recorded("octo/widgets"), 0);
    }

    #[test]
    fn test_admits_with_case_insensitive_label() {
        let controller = controller(10, 10);
        let admission = admit(&controller, "workflow_job", &payload("queued", &["Self-Hosted"]));
        let decision = admission.decision();
        assert!(decision.admitted);
        assert_eq!(decision.reason, AdmissionReason::Admitted);
        assert_eq!(controller.gate().in_use(), 1);
    }

    #[test]
    fn test_rate_limit_precedes_capacity() {
        let controller = controller(1, 10);
        let body = payload("queued", &["self-hosted"]);

        let first = admit(&controller, "workflow_job", &body);
        assert_eq!(reason(&first), AdmissionReason::Admitted);

        let second = admit(&controller, "workflow_job", &body);
        assert_eq!(reason(&second), AdmissionReason::RateLimited);
        assert_eq!(controller.gate().in_use(), 1);
    }

    #[test]
    fn test_capacity_exhausted_and_released() {
        let controller = controller(10, 1);
        let body = payload("queued", &["self-hosted"]);

        let first = admit(&controller, "workflow_job", &body);
        assert_eq!(reason(&first), AdmissionReason::Admitted);
        let second = admit(&controller, "workflow_job", &body);
        assert_eq!(reason(&second), AdmissionReason::CapacityExhausted);

        drop(first);
        let third = admit(&controller, "workflow_job", &body);
        assert_eq!(reason(&third), AdmissionReason::Admitted);
    }
}
