//! In-memory compute provider for tests and local development.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use super::{ComputeProvider, CreateInstanceRequest, Instance, InstanceId, ProviderError};

/// Provider that keeps instances in memory and records every call.
pub struct MockProvider {
    next_id: AtomicU64,
    instances: Mutex<BTreeMap<InstanceId, Instance>>,
    created: Mutex<Vec<CreateInstanceRequest>>,
    delete_attempts: Mutex<Vec<InstanceId>>,
    failing_deletes: Mutex<HashSet<InstanceId>>,
    stalled_deletes: Mutex<HashSet<InstanceId>>,
    fail_creates: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            instances: Mutex::new(BTreeMap::new()),
            created: Mutex::new(Vec::new()),
            delete_attempts: Mutex::new(Vec::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            stalled_deletes: Mutex::new(HashSet::new()),
            fail_creates: false,
        }
    }

    /// A provider whose creates always fail.
    pub fn failing_creates() -> Self {
        Self {
            fail_creates: true,
            ..Self::new()
        }
    }

    /// Seed an existing instance.
    pub fn insert(&self, id: u64, name: &str, created_at: DateTime<Utc>, tags: &[&str]) {
        let instance = Instance {
            id: InstanceId(id),
            name: name.to_string(),
            created_at,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        lock(&self.instances).insert(instance.id, instance);
    }

    /// Make deletes of `id` fail.
    pub fn fail_delete(&self, id: u64) {
        lock(&self.failing_deletes).insert(InstanceId(id));
    }

    /// Make deletes of `id` never complete.
    pub fn stall_delete(&self, id: u64) {
        lock(&self.stalled_deletes).insert(InstanceId(id));
    }

    /// Create requests received so far.
    pub fn created(&self) -> Vec<CreateInstanceRequest> {
        lock(&self.created).clone()
    }

    /// Every id a delete was attempted for, in call order.
    pub fn delete_attempts(&self) -> Vec<InstanceId> {
        lock(&self.delete_attempts).clone()
    }

    /// Ids of instances still present.
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        lock(&self.instances).keys().copied().collect()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ComputeProvider for MockProvider {
    async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<Instance, ProviderError> {
        lock(&self.created).push(request.clone());

        if self.fail_creates {
            return Err(ProviderError::Other(
                "mock provider configured to fail".to_string(),
            ));
        }

        let instance = Instance {
            id: InstanceId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            name: request.name.clone(),
            created_at: Utc::now(),
            tags: request.tags.clone(),
        };
        info!(instance_id = %instance.id, runner_name = %instance.name, "[MOCK] Created instance");
        lock(&self.instances).insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn delete_instance(&self, id: InstanceId) -> Result<(), ProviderError> {
        lock(&self.delete_attempts).push(id);

        let stalled = lock(&self.stalled_deletes).contains(&id);
        if stalled {
            std::future::pending::<()>().await;
        }

        if lock(&self.failing_deletes).contains(&id) {
            return Err(ProviderError::Api {
                status: 500,
                body: "mock delete failure".to_string(),
            });
        }

        match lock(&self.instances).remove(&id) {
            Some(_) => Ok(()),
            None => Err(ProviderError::NotFound(id)),
        }
    }

    async fn list_instances_by_tag(&self, tag: &str) -> Result<Vec<Instance>, ProviderError> {
        Ok(lock(&self.instances)
            .values()
            .filter(|i| i.tags.iter().any(|t| t == tag))
            .cloned()
            .collect())
    }
}
