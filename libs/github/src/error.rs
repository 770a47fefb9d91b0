//! Error types for the credential chain.

use std::fmt;

use thiserror::Error;

/// The network exchange that failed within a credential chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStep {
    /// Exchanging the App assertion for an installation access token.
    InstallationToken,
    /// Exchanging the installation token for a runner registration token.
    RegistrationToken,
}

impl fmt::Display for ChainStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainStep::InstallationToken => write!(f, "installation token"),
            ChainStep::RegistrationToken => write!(f, "runner registration token"),
        }
    }
}

/// Errors that can occur while building a credential chain.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The App private key could not be parsed.
    #[error("invalid App private key: {0}")]
    InvalidKey(String),

    /// Signing the identity assertion failed.
    #[error("failed to sign App assertion: {0}")]
    Signing(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The request never produced a response.
    #[error("request for {step} failed: {source}")]
    Transport {
        step: ChainStep,
        #[source]
        source: reqwest::Error,
    },

    /// The identity service answered with something other than 201 Created.
    #[error("unexpected status {status} requesting {step}")]
    UnexpectedStatus { step: ChainStep, status: u16 },

    /// The response body did not contain a usable token.
    #[error("malformed {step} response: {message}")]
    MalformedResponse { step: ChainStep, message: String },
}

impl CredentialError {
    /// The chain step that failed, if the failure was a network exchange.
    pub fn step(&self) -> Option<ChainStep> {
        match self {
            CredentialError::Transport { step, .. }
            | CredentialError::UnexpectedStatus { step, .. }
            | CredentialError::MalformedResponse { step, .. } => Some(*step),
            _ => None,
        }
    }
}
