//! In-memory secret store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{SecretStore, SecretStoreError};

/// Secret store backed by a map. Can be told to fail writes.
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
    puts: Mutex<Vec<String>>,
    fail_puts: bool,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        lock(&self.secrets).get(name).cloned()
    }

    /// Number of secrets currently stored.
    pub fn len(&self) -> usize {
        lock(&self.secrets).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names passed to `put`, in call order, including failed writes.
    pub fn put_names(&self) -> Vec<String> {
        lock(&self.puts).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretStoreError> {
        lock(&self.puts).push(name.to_string());
        if self.fail_puts {
            return Err(SecretStoreError::Api {
                name: name.to_string(),
                status: 503,
            });
        }
        lock(&self.secrets).insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SecretStoreError> {
        lock(&self.secrets).remove(name);
        Ok(())
    }
}
