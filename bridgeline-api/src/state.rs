//! Shared application state for Axum routers.

use std::sync::Arc;

use bridgeline_coordinator::Coordinator;
use bridgeline_storage::PairingStore;

use crate::config::StoreBackend;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    /// Which backend the coordinator's store runs on, reported by readiness.
    pub store_backend: StoreBackend,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(coordinator: Coordinator, store_backend: StoreBackend) -> Self {
        Self {
            coordinator,
            store_backend,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn store(&self) -> &Arc<dyn PairingStore> {
        self.coordinator.store()
    }
}
