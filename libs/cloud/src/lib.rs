//! External collaborators for ephemeral runner provisioning.
//!
//! Each collaborator is a narrow trait with one production implementation
//! and one in-memory implementation used by tests:
//!
//! | Trait | Production | In-memory |
//! |---|---|---|
//! | [`ComputeProvider`] | [`DigitalOceanClient`] | [`MockProvider`] |
//! | [`SecretStore`] | [`VaultKvStore`] | [`InMemorySecretStore`] |
//! | [`BootstrapRenderer`] | [`TemplateRenderer`] | - |

pub mod bootstrap;
pub mod provider;
pub mod secrets;

pub use bootstrap::{BootstrapError, BootstrapParams, BootstrapRenderer, TemplateRenderer};
pub use provider::digitalocean::{DigitalOceanClient, DigitalOceanConfig};
pub use provider::mock::MockProvider;
pub use provider::{ComputeProvider, CreateInstanceRequest, Instance, InstanceId, ProviderError};
pub use secrets::memory::InMemorySecretStore;
pub use secrets::vault::VaultKvStore;
pub use secrets::{SecretStore, SecretStoreError};

/// Tag applied to every runner instance; the reaper lists by this tag.
pub const RUNNER_TAG: &str = "github-runner";

/// Tag marking an instance as single-use.
pub const EPHEMERAL_TAG: &str = "ephemeral";
