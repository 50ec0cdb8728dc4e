//! Health endpoints: `/health/ping`, `/health/live` and `/health/ready`.
//!
//! Only readiness touches the pairing store.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::config::StoreBackend;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    fn status_code(self) -> StatusCode {
        match self {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Body of the liveness and readiness responses.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// Present on readiness only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreCheck {
    pub backend: StoreBackend,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn liveness(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        store: None,
    })
}

/// 200 when the pairing store answers its health check, 503 otherwise.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let started = Instant::now();
    let error = match state.store().health_check().await {
        Ok(true) => None,
        Ok(false) => Some("Store reported unhealthy".to_string()),
        Err(e) => Some(e.to_string()),
    };
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let status = match &error {
        None => HealthStatus::Healthy,
        Some(e) => {
            tracing::warn!(backend = ?state.store_backend, error = %e, "Readiness check failed");
            HealthStatus::Unhealthy
        }
    };

    let report = HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        store: Some(StoreCheck {
            backend: state.store_backend,
            latency_ms,
            error,
        }),
    };
    (status.status_code(), Json(report))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
