//! Bridgeline API Server Entry Point
//!
//! Bootstraps telemetry and configuration, opens the pairing store and
//! starts the Axum HTTP server.

use bridgeline_api::telemetry::{init_tracing, TelemetryConfig};
use bridgeline_api::{build_state, create_api_router, ApiConfig, ApiError, ApiResult};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let api_config = ApiConfig::from_env()?;
    let state = build_state(&api_config).await?;
    let app = create_api_router(state, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting Bridgeline API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
