//! GitHub integration for ephemeral runner provisioning.
//!
//! This crate covers everything the provisioner needs from GitHub:
//!
//! - **Webhook schema**: the `workflow_job` event payload ([`event`]).
//! - **Signature verification**: HMAC-SHA256 over the raw request body
//!   ([`signature`]).
//! - **Credential chain**: App identity assertion, installation access token
//!   and repository-scoped runner registration token ([`credentials`]).
//!
//! Nothing here caches credentials. Every call to
//! [`CredentialIssuer::issue`] builds a fresh chain.

pub mod app;
pub mod credentials;
pub mod error;
pub mod event;
pub mod signature;
pub mod token;

pub use app::AppAssertionSigner;
pub use credentials::{CredentialChain, CredentialIssuer, GitHubApp};
pub use error::{ChainStep, CredentialError};
pub use event::{JobAction, WorkflowJobEvent};
pub use signature::verify_webhook_signature;
pub use token::{IssuedToken, SecretToken};

/// Header carrying the webhook HMAC signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Header carrying the webhook event type.
pub const EVENT_HEADER: &str = "X-GitHub-Event";

/// Event type for job-queue notifications.
pub const WORKFLOW_JOB_EVENT: &str = "workflow_job";
