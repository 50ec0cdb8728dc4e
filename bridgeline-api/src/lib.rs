//! Bridgeline API - Telephony Callback Server
//!
//! Axum front door for the call-pairing coordinator. The telephony platform
//! posts initiate callbacks here and receives BXML documents in return.
//! Pairing state lives in memory or in PostgreSQL depending on configuration.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use bridgeline_coordinator::Coordinator;
use bridgeline_core::CoordinatorConfig;
use bridgeline_notify::{FcmConfig, FcmNotifier, NotificationDispatcher};
use bridgeline_storage::{InMemoryPairingStore, PairingStore};

pub use config::{ApiConfig, StoreBackend};
pub use db::{DbConfig, PgPairingStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;

/// Build the notification dispatcher from `BRIDGELINE_FCM_*` settings.
///
/// Without a configured project, notifications are only logged.
pub fn dispatcher_from_env() -> ApiResult<NotificationDispatcher> {
    let Some(fcm) = FcmConfig::from_env().map_err(|e| ApiError::internal_error(e.to_string()))?
    else {
        tracing::warn!("BRIDGELINE_FCM_PROJECT_ID not set, push notifications will only be logged");
        return Ok(NotificationDispatcher::log_only());
    };

    let policy = fcm.retry_policy();
    tracing::info!(project_id = %fcm.project_id, "FCM push notifications enabled");
    let notifier = FcmNotifier::new(fcm).map_err(|e| ApiError::internal_error(e.to_string()))?;
    Ok(NotificationDispatcher::new(Arc::new(notifier), policy))
}

/// Open the configured pairing store, bootstrapping the schema for PostgreSQL.
pub async fn store_from_config(config: &ApiConfig) -> ApiResult<Arc<dyn PairingStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory pairing store");
            Ok(Arc::new(InMemoryPairingStore::new()))
        }
        StoreBackend::Postgres => {
            let db_config = DbConfig::from_env();
            tracing::info!(host = %db_config.host, dbname = %db_config.dbname, "Using PostgreSQL pairing store");
            let store = PgPairingStore::new(db_config.create_pool()?);
            store.bootstrap().await?;
            Ok(Arc::new(store))
        }
    }
}

/// Assemble application state from the environment.
pub async fn build_state(config: &ApiConfig) -> ApiResult<AppState> {
    let store = store_from_config(config).await?;
    let dispatcher = dispatcher_from_env()?;
    let coordinator = Coordinator::new(store, dispatcher, CoordinatorConfig::from_env());
    Ok(AppState::new(coordinator, config.store_backend))
}
