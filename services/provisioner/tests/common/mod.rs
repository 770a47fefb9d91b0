#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use ghr_cloud::{InMemorySecretStore, MockProvider, TemplateRenderer};
use ghr_github::{
    signature::sign_payload, CredentialChain, CredentialError, CredentialIssuer, IssuedToken,
    SecretToken,
};
use ghr_provisioner::{
    admission::{AdmissionController, ConcurrencyGate, RepoRateLimiter},
    api::create_router,
    provision::{ProvisionerConfig, ProvisioningOrchestrator},
    state::{AppState, CallbackSettings},
};
use tokio::sync::watch;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const CALLBACK_SECRET: &str = "test-callback-secret";
pub const REGISTRATION_TOKEN: &str = "AABBCCREGISTRATION";

pub const TEMPLATE: &str = "name={{runner_name}}\n\
token_ref={{runner_token_secret}}\n\
labels={{runner_labels}}\n\
repo={{runner_repo}}\n\
callback={{callback_url}} {{secret_mount}}{{callback_secret_ref}}\n\
v{{runner_version}} {{runner_owner}}\n";

/// Credential issuer that counts calls and can hold every call open until
/// released.
pub struct StubIssuer {
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    open: watch::Sender<bool>,
}

impl StubIssuer {
    pub fn new() -> Self {
        Self::with_gate(true)
    }

    /// Every `issue` call waits until [`StubIssuer::release`].
    pub fn blocked() -> Self {
        Self::with_gate(false)
    }

    fn with_gate(open: bool) -> Self {
        let (open, _) = watch::channel(open);
        Self {
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            open,
        }
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialIssuer for StubIssuer {
    async fn issue(&self, _owner: &str, _repo: &str) -> Result<CredentialChain, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(CredentialChain {
            assertion: IssuedToken::new("app-jwt", None),
            installation: IssuedToken::new("ghs_installation", None),
            registration: IssuedToken::new(REGISTRATION_TOKEN, None),
        })
    }
}

pub struct Harness {
    pub state: AppState,
    pub router: Router,
    pub issuer: Arc<StubIssuer>,
    pub secrets: Arc<InMemorySecretStore>,
    pub provider: Arc<MockProvider>,
}

pub struct Limits {
    pub per_repo: usize,
    pub window: Duration,
    pub capacity: usize,
    pub deadline: Duration,
    pub callback_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            per_repo: 100,
            window: Duration::from_secs(60),
            capacity: 10,
            deadline: Duration::from_secs(5),
            callback_timeout: Duration::from_secs(2),
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::build(StubIssuer::new(), MockProvider::new(), Limits::default())
    }

    pub fn build(issuer: StubIssuer, provider: MockProvider, limits: Limits) -> Self {
        let issuer = Arc::new(issuer);
        let secrets = Arc::new(InMemorySecretStore::new());
        let provider = Arc::new(provider);

        let orchestrator = ProvisioningOrchestrator::new(
            issuer.clone(),
            secrets.clone(),
            provider.clone(),
            Arc::new(TemplateRenderer::new(TEMPLATE)),
            ProvisionerConfig {
                region: "nyc3".to_string(),
                size: "s-4vcpu-8gb".to_string(),
                image: "ubuntu-24-04-x64".to_string(),
                ssh_keys: vec!["aa:bb:cc".to_string()],
                runner_version: "2.331.0".to_string(),
                callback_url: "https://hooks.example.com/callback/destroy".to_string(),
                callback_secret_ref: "/github-runners/callback-secret".to_string(),
                token_secret_prefix: "/github-runners/tokens".to_string(),
                secret_mount: "secret".to_string(),
                deadline: limits.deadline,
            },
        );

        let admission = AdmissionController::with_parts(
            SecretToken::new(WEBHOOK_SECRET),
            "self-hosted".to_string(),
            RepoRateLimiter::new(limits.per_repo, limits.window),
            ConcurrencyGate::new(limits.capacity),
        );

        let state = AppState::new(
            admission,
            Arc::new(orchestrator),
            provider.clone(),
            CallbackSettings {
                secret: SecretToken::new(CALLBACK_SECRET),
                timeout: limits.callback_timeout,
            },
        );

        Self {
            router: create_router(state.clone()),
            state,
            issuer,
            secrets,
            provider,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Wait until every provisioning task has returned its slot.
    pub async fn settle(&self) {
        let gate = self.state.admission().gate();
        eventually(|| gate.available() == gate.capacity()).await;
    }
}

pub fn job_payload(action: &str, repo: &str, job_id: i64, labels: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "action": action,
        "workflow_job": { "id": job_id, "name": "build", "labels": labels },
        "repository": {
            "full_name": format!("octo/{repo}"),
            "name": repo,
            "owner": { "login": "octo" }
        },
        "organization": { "login": "octo" }
    }))
    .unwrap()
}

pub fn signed_webhook(event: &str, body: Vec<u8>) -> Request<Body> {
    let signature = sign_payload(&body, WEBHOOK_SECRET.as_bytes()).unwrap();
    Request::post("/webhook")
        .header("X-GitHub-Event", event)
        .header("X-Hub-Signature-256", signature)
        .header("X-Forwarded-For", "192.0.2.10")
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

pub fn queued_job(repo: &str, job_id: i64) -> Request<Body> {
    signed_webhook("workflow_job", job_payload("queued", repo, job_id, &["self-hosted"]))
}

pub fn callback_request(secret: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder =
        Request::post("/callback/destroy").header("Content-Type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("X-Callback-Secret", secret);
    }
    builder.body(body.into()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `condition` for up to two seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}
