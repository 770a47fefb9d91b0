//! Fixed-capacity concurrency gate for provisioning tasks.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of provisioning tasks running at once.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// One capacity token. Dropping it returns the token to the gate, so a task
/// that owns its slot releases it on every exit path, panics included.
#[derive(Debug)]
pub struct ConcurrencySlot {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Take a slot without waiting. Returns `None` when the pool is full.
    pub fn try_acquire(&self) -> Option<ConcurrencySlot> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| ConcurrencySlot { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}
