//! Runner registration credential chain.
//!
//! Registering an ephemeral runner takes three credentials, each obtained by
//! presenting the previous one:
//!
//! 1. App identity assertion (signed locally, see [`crate::app`])
//! 2. Installation access token (`POST /app/installations/{id}/access_tokens`)
//! 3. Repository runner registration token
//!    (`POST /repos/{owner}/{repo}/actions/runners/registration-token`)
//!
//! Every exchange must answer `201 Created`; anything else fails the chain.
//! There is no retry and no caching: a compromised or expired token never
//! outlives the provisioning attempt that asked for it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::app::AppAssertionSigner;
use crate::error::{ChainStep, CredentialError};
use crate::token::IssuedToken;

/// Public GitHub REST API.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("ghr-provisioner/", env!("CARGO_PKG_VERSION"));

/// A freshly built credential chain for one repository.
#[derive(Debug, Clone)]
pub struct CredentialChain {
    pub assertion: IssuedToken,
    pub installation: IssuedToken,
    pub registration: IssuedToken,
}

/// Produces the credentials needed to register a runner for a repository.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Build a complete chain for `owner/repo`.
    async fn issue(&self, owner: &str, repo: &str) -> Result<CredentialChain, CredentialError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// GitHub App credential issuer.
#[derive(Debug)]
pub struct GitHubApp {
    signer: AppAssertionSigner,
    installation_id: u64,
    client: reqwest::Client,
    api_base: String,
}

impl GitHubApp {
    /// Create an issuer talking to the public GitHub API.
    pub fn new(signer: AppAssertionSigner, installation_id: u64) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CredentialError::Client(e.to_string()))?;

        Ok(Self {
            signer,
            installation_id,
            client,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Point the issuer at a different API root (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Exchange an App assertion for an installation access token.
    pub async fn installation_token(
        &self,
        assertion: &IssuedToken,
    ) -> Result<IssuedToken, CredentialError> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base, self.installation_id
        );
        let authorization = format!("Bearer {}", assertion.token.expose());
        self.exchange(ChainStep::InstallationToken, &url, &authorization)
            .await
    }

    /// Exchange an installation token for a repository registration token.
    pub async fn repo_registration_token(
        &self,
        installation: &IssuedToken,
        owner: &str,
        repo: &str,
    ) -> Result<IssuedToken, CredentialError> {
        let url = format!(
            "{}/repos/{}/{}/actions/runners/registration-token",
            self.api_base, owner, repo
        );
        let authorization = format!("token {}", installation.token.expose());
        self.exchange(ChainStep::RegistrationToken, &url, &authorization)
            .await
    }

    async fn exchange(
        &self,
        step: ChainStep,
        url: &str,
        authorization: &str,
    ) -> Result<IssuedToken, CredentialError> {
        debug!(url = %url, step = %step, "Requesting token");

        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, authorization)
            .header(header::ACCEPT, ACCEPT)
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await
            .map_err(|source| CredentialError::Transport { step, source })?;

        if response.status() != StatusCode::CREATED {
            return Err(CredentialError::UnexpectedStatus {
                step,
                status: response.status().as_u16(),
            });
        }

        let body: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| CredentialError::MalformedResponse {
                    step,
                    message: e.to_string(),
                })?;

        if body.token.is_empty() {
            return Err(CredentialError::MalformedResponse {
                step,
                message: "empty token".to_string(),
            });
        }

        Ok(IssuedToken::new(body.token, body.expires_at))
    }
}

#[async_trait]
impl CredentialIssuer for GitHubApp {
    async fn issue(&self, owner: &str, repo: &str) -> Result<CredentialChain, CredentialError> {
        let assertion = self.signer.sign()?;
        let installation = self.installation_token(&assertion).await?;
        let registration = self
            .repo_registration_token(&installation, owner, repo)
            .await?;

        Ok(CredentialChain {
            assertion,
            installation,
            registration,
        })
    }
}
