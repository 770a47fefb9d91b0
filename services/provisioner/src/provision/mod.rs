//! Provisioning orchestrator.
//!
//! Turns an admitted `workflow_job` event into a running ephemeral runner:
//!
//! 1. Validate owner and repository names
//! 2. Build a fresh credential chain
//! 3. Derive the runner name
//! 4. Sanitize labels
//! 5. Render bootstrap data (references only, no secret values)
//! 6. Store the registration token in the secret store
//! 7. Create the instance
//!
//! Failures abort the attempt and are logged with the job and repository.
//! There is no retry; GitHub's own queue timeout is the recovery path. If
//! instance creation fails after the token was stored, the stored token is
//! deleted on a best-effort basis.

pub mod naming;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ghr_cloud::{
    BootstrapError, BootstrapParams, BootstrapRenderer, ComputeProvider, CreateInstanceRequest,
    InstanceId, ProviderError, SecretStore, SecretStoreError, EPHEMERAL_TAG, RUNNER_TAG,
};
use ghr_github::{CredentialError, CredentialIssuer, SecretToken, WorkflowJobEvent};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::admission::AdmittedJob;

/// Default overall deadline for one provisioning attempt.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);

/// The step a provisioning attempt was on when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Validate,
    Credentials,
    Bootstrap,
    StoreSecret,
    CreateInstance,
    Deadline,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionStep::Validate => "validate",
            ProvisionStep::Credentials => "credentials",
            ProvisionStep::Bootstrap => "bootstrap",
            ProvisionStep::StoreSecret => "store_secret",
            ProvisionStep::CreateInstance => "create_instance",
            ProvisionStep::Deadline => "deadline",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("credential chain failed: {0}")]
    Credentials(#[from] CredentialError),

    #[error("bootstrap rendering failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("storing registration token failed: {0}")]
    SecretStore(#[from] SecretStoreError),

    #[error("instance creation failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("provisioning deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl ProvisionError {
    pub fn step(&self) -> ProvisionStep {
        match self {
            ProvisionError::InvalidInput(_) => ProvisionStep::Validate,
            ProvisionError::Credentials(_) => ProvisionStep::Credentials,
            ProvisionError::Bootstrap(_) => ProvisionStep::Bootstrap,
            ProvisionError::SecretStore(_) => ProvisionStep::StoreSecret,
            ProvisionError::Provider(_) => ProvisionStep::CreateInstance,
            ProvisionError::DeadlineExceeded(_) => ProvisionStep::Deadline,
        }
    }
}

/// Static settings for every runner instance.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub region: String,
    pub size: String,
    pub image: String,
    pub ssh_keys: Vec<String>,
    pub runner_version: String,
    pub callback_url: String,
    /// Secret-store name the worker reads the callback secret from.
    pub callback_secret_ref: String,
    /// Prefix for per-runner registration token secrets.
    pub token_secret_prefix: String,
    /// KV mount both secret references live under.
    pub secret_mount: String,
    pub deadline: Duration,
}

/// Everything needed to create one runner, built from an admitted event.
#[derive(Debug, Clone)]
pub struct RunnerProvisioningRequest {
    pub job_id: i64,
    pub owner: String,
    pub repo: String,
    pub repo_full_name: String,
    pub runner_name: String,
    pub labels: Vec<String>,
    pub registration_token: SecretToken,
    pub token_secret: String,
}

impl RunnerProvisioningRequest {
    pub fn bootstrap_params(&self, config: &ProvisionerConfig) -> BootstrapParams {
        BootstrapParams {
            runner_name: self.runner_name.clone(),
            runner_token_secret: self.token_secret.clone(),
            runner_labels: self.labels.join(","),
            runner_owner: self.owner.clone(),
            runner_repo: self.repo_full_name.clone(),
            runner_version: config.runner_version.clone(),
            callback_secret_ref: format!(
                "/{}",
                config.callback_secret_ref.trim_start_matches('/')
            ),
            callback_url: config.callback_url.clone(),
            secret_mount: config.secret_mount.trim_matches('/').to_string(),
        }
    }
}

/// A runner that was successfully requested from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedRunner {
    pub runner_name: String,
    pub instance_id: InstanceId,
}

pub struct ProvisioningOrchestrator {
    credentials: Arc<dyn CredentialIssuer>,
    secrets: Arc<dyn SecretStore>,
    provider: Arc<dyn ComputeProvider>,
    bootstrap: Arc<dyn BootstrapRenderer>,
    config: ProvisionerConfig,
}

impl ProvisioningOrchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialIssuer>,
        secrets: Arc<dyn SecretStore>,
        provider: Arc<dyn ComputeProvider>,
        bootstrap: Arc<dyn BootstrapRenderer>,
        config: ProvisionerConfig,
    ) -> Self {
        Self {
            credentials,
            secrets,
            provider,
            bootstrap,
            config,
        }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Run an admitted job on its own task. The job's concurrency slot is
    /// held by the task and released when it finishes.
    pub fn spawn(self: &Arc<Self>, job: AdmittedJob) -> JoinHandle<()> {
        let AdmittedJob { event, slot } = job;
        let span = info_span!(
            "provision",
            job_id = event.job_id(),
            repo = %event.repo_full_name()
        );
        let orchestrator = Arc::clone(self);

        tokio::spawn(
            async move {
                let _slot = slot;
                let _ = orchestrator.run(&event).await;
            }
            .instrument(span),
        )
    }

    /// Provision under the configured deadline and log the outcome.
    pub async fn run(&self, event: &WorkflowJobEvent) -> Result<ProvisionedRunner, ProvisionError> {
        let deadline = self.config.deadline;
        let result = match tokio::time::timeout(deadline, self.provision(event)).await {
            Ok(result) => result,
            Err(_) => Err(ProvisionError::DeadlineExceeded(deadline)),
        };

        match &result {
            Ok(runner) => info!(
                job_id = event.job_id(),
                repo = %event.repo_full_name(),
                runner_name = %runner.runner_name,
                instance_id = %runner.instance_id,
                "Provisioned runner"
            ),
            Err(e) => error!(
                job_id = event.job_id(),
                owner = %event.owner_login(),
                repo = %event.repo_full_name(),
                step = %e.step(),
                error = %e,
                "Provisioning failed"
            ),
        }

        result
    }

    /// Execute the provisioning steps without a deadline.
    pub async fn provision(
        &self,
        event: &WorkflowJobEvent,
    ) -> Result<ProvisionedRunner, ProvisionError> {
        let owner = event.owner_login();
        let repo = event.repo_name();

        if !naming::is_safe_name(owner) || !naming::is_safe_name(repo) {
            return Err(ProvisionError::InvalidInput(format!(
                "owner/repo contains disallowed characters: {owner:?}/{repo:?}"
            )));
        }
        let repo_full_name = format!("{owner}/{repo}");
        if !naming::is_valid_repo_full_name(&repo_full_name) {
            return Err(ProvisionError::InvalidInput(format!(
                "invalid repository name: {repo_full_name:?}"
            )));
        }

        let chain = self.credentials.issue(owner, repo).await?;

        let runner_name = naming::runner_name(repo, event.job_id(), Utc::now());
        let request = RunnerProvisioningRequest {
            job_id: event.job_id(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            repo_full_name,
            token_secret: naming::token_secret_name(&self.config.token_secret_prefix, &runner_name),
            runner_name,
            labels: naming::sanitize_labels(event.labels()),
            registration_token: chain.registration.token,
        };

        let user_data = self
            .bootstrap
            .render(&request.bootstrap_params(&self.config))?;

        self.secrets
            .put(&request.token_secret, request.registration_token.expose())
            .await?;

        let create = CreateInstanceRequest {
            name: request.runner_name.clone(),
            region: self.config.region.clone(),
            size: self.config.size.clone(),
            image: self.config.image.clone(),
            user_data,
            ssh_keys: self.config.ssh_keys.clone(),
            tags: vec![RUNNER_TAG.to_string(), EPHEMERAL_TAG.to_string()],
        };

        let instance = match self.provider.create_instance(&create).await {
            Ok(instance) => instance,
            Err(e) => {
                self.discard_token(&request.token_secret).await;
                return Err(e.into());
            }
        };

        Ok(ProvisionedRunner {
            runner_name: request.runner_name,
            instance_id: instance.id,
        })
    }

    async fn discard_token(&self, name: &str) {
        if let Err(e) = self.secrets.delete(name).await {
            warn!(secret = %name, error = %e, "Failed to delete orphaned registration token");
        }
    }
}
