//! Secret store interface.
//!
//! The provisioner parks each single-use runner registration token in a
//! secret store under a name derived from the runner name. The worker reads
//! it back at boot, so the raw token never appears in bootstrap data.

pub mod memory;
pub mod vault;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by secret stores.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("secret store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("secret store returned {status} for {name}")]
    Api { name: String, status: u16 },

    #[error("invalid secret name: {0}")]
    InvalidName(String),
}

/// Named secret storage with overwrite semantics.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Store `value` under `name`, replacing any previous value.
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretStoreError>;

    /// Remove `name`. Removing a missing secret is not an error.
    async fn delete(&self, name: &str) -> Result<(), SecretStoreError>;
}
