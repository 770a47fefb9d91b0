//! Construction of production collaborators from [`Config`].

use std::sync::Arc;

use anyhow::{Context, Result};
use ghr_cloud::{
    ComputeProvider, DigitalOceanClient, DigitalOceanConfig, TemplateRenderer, VaultKvStore,
};
use ghr_github::{AppAssertionSigner, GitHubApp};

use crate::admission::{AdmissionConfig, AdmissionController};
use crate::cleanup::ReaperConfig;
use crate::config::Config;
use crate::provision::{ProvisionerConfig, ProvisioningOrchestrator};
use crate::state::{AppState, CallbackSettings};

pub fn digitalocean_provider(config: &Config) -> Result<Arc<dyn ComputeProvider>> {
    let client = DigitalOceanClient::new(DigitalOceanConfig::new(
        config.digitalocean.token.expose(),
    ))
    .context("Failed to build DigitalOcean client")?;
    Ok(Arc::new(client))
}

pub fn reaper_config(config: &Config) -> ReaperConfig {
    let defaults = ReaperConfig::default();
    ReaperConfig {
        interval: config.reaper.interval.unwrap_or(defaults.interval),
        max_age: config.reaper.max_age,
        sweep_timeout: config.reaper.timeout,
        ..defaults
    }
}

/// Build the full application state backed by GitHub, Vault and `provider`.
pub fn build_state(config: &Config, provider: Arc<dyn ComputeProvider>) -> Result<AppState> {
    let key_path = &config.github.private_key_file;
    let pem = std::fs::read(key_path)
        .with_context(|| format!("Failed to read GitHub App key {}", key_path.display()))?;
    let signer = AppAssertionSigner::from_pem(config.github.app_id, &pem)
        .context("Failed to load GitHub App private key")?;
    let github = GitHubApp::new(signer, config.github.installation_id)
        .context("Failed to build GitHub client")?;

    let secrets = VaultKvStore::new(
        config.vault.addr.as_str(),
        config.vault.mount.as_str(),
        config.vault.token.expose(),
    )
    .context("Failed to build Vault client")?;

    let renderer = TemplateRenderer::from_file(&config.runner.cloud_init_path)
        .context("Failed to load cloud-init template")?;

    let orchestrator = ProvisioningOrchestrator::new(
        Arc::new(github),
        Arc::new(secrets),
        provider.clone(),
        Arc::new(renderer),
        ProvisionerConfig {
            region: config.digitalocean.region.clone(),
            size: config.digitalocean.size.clone(),
            image: config.digitalocean.image.clone(),
            ssh_keys: config.digitalocean.ssh_fingerprints.clone(),
            runner_version: config.runner.version.clone(),
            callback_url: config.runner.callback_url.clone(),
            callback_secret_ref: config.runner.callback_secret_path.clone(),
            token_secret_prefix: config.runner.token_prefix.clone(),
            secret_mount: config.vault.mount.clone(),
            deadline: config.limits.provision_timeout,
        },
    );

    let admission = AdmissionController::new(AdmissionConfig {
        webhook_secret: config.github.webhook_secret.clone(),
        required_label: config.runner.required_label.clone(),
        max_per_repo_per_window: config.limits.max_per_repo_per_min,
        max_concurrent: config.limits.max_concurrent,
    });

    Ok(AppState::new(
        admission,
        Arc::new(orchestrator),
        provider,
        CallbackSettings {
            secret: config.runner.callback_secret.clone(),
            timeout: config.limits.callback_timeout,
        },
    ))
}
