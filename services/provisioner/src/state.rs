//! Application state shared across request handlers.

use std::sync::Arc;
use std::time::Duration;

use ghr_cloud::ComputeProvider;
use ghr_github::SecretToken;

use crate::admission::AdmissionController;
use crate::provision::ProvisioningOrchestrator;

/// Settings for the self-destruct callback endpoint.
#[derive(Debug, Clone)]
pub struct CallbackSettings {
    pub secret: SecretToken,
    pub timeout: Duration,
}

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    admission: AdmissionController,
    orchestrator: Arc<ProvisioningOrchestrator>,
    provider: Arc<dyn ComputeProvider>,
    callback: CallbackSettings,
}

impl AppState {
    pub fn new(
        admission: AdmissionController,
        orchestrator: Arc<ProvisioningOrchestrator>,
        provider: Arc<dyn ComputeProvider>,
        callback: CallbackSettings,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                admission,
                orchestrator,
                provider,
                callback,
            }),
        }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.inner.admission
    }

    pub fn orchestrator(&self) -> &Arc<ProvisioningOrchestrator> {
        &self.inner.orchestrator
    }

    /// Provider used by the callback path to delete instances.
    pub fn provider(&self) -> &Arc<dyn ComputeProvider> {
        &self.inner.provider
    }

    pub fn callback(&self) -> &CallbackSettings {
        &self.inner.callback
    }
}
