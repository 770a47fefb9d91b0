//! Compute provider interface.
//!
//! The provisioner only ever issues create, delete and list-by-tag commands.
//! It keeps no instance state of its own; the provider account is the source
//! of truth.

pub mod digitalocean;
pub mod mock;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider-assigned instance identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A running (or booting) instance as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl Instance {
    /// Age of the instance relative to `now`. Never negative.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.created_at).max(chrono::Duration::zero())
    }
}

/// Everything the provider needs to create one runner instance.
#[derive(Clone, PartialEq, Eq)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    pub user_data: String,
    pub ssh_keys: Vec<String>,
    pub tags: Vec<String>,
}

impl fmt::Debug for CreateInstanceRequest {
    // user_data may reference secrets; keep it out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateInstanceRequest")
            .field("name", &self.name)
            .field("region", &self.region)
            .field("size", &self.size)
            .field("image", &self.image)
            .field("user_data_bytes", &self.user_data.len())
            .field("ssh_keys", &self.ssh_keys.len())
            .field("tags", &self.tags)
            .finish()
    }
}

/// Errors returned by compute providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("instance {0} not found")]
    NotFound(InstanceId),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Other(String),
}

/// Compute provider operations used by the provisioner and reaper.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Create an instance. Returns once the provider has accepted the request.
    async fn create_instance(&self, request: &CreateInstanceRequest)
        -> Result<Instance, ProviderError>;

    /// Delete an instance by id.
    async fn delete_instance(&self, id: InstanceId) -> Result<(), ProviderError>;

    /// List every instance carrying `tag`.
    async fn list_instances_by_tag(&self, tag: &str) -> Result<Vec<Instance>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_age_is_clamped_at_zero() {
        let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let instance = Instance {
            id: InstanceId(1),
            name: "eph".to_string(),
            created_at,
            tags: vec![],
        };
        let earlier = created_at - chrono::Duration::minutes(5);
        let later = created_at + chrono::Duration::minutes(90);
        assert_eq!(instance.age(earlier), chrono::Duration::zero());
        assert_eq!(instance.age(later), chrono::Duration::minutes(90));
    }

    #[test]
    fn test_create_request_debug_omits_user_data() {
        let request = CreateInstanceRequest {
            name: "eph-widgets-1-2".to_string(),
            region: "nyc3".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            image: "ubuntu-24-04-x64".to_string(),
            user_data: "#cloud-config\nsecret: hunter2".to_string(),
            ssh_keys: vec![],
            tags: vec!["github-runner".to_string()],
        };
        let debug = format!("{request:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("user_data_bytes"));
    }
}
