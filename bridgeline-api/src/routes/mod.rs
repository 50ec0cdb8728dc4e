//! HTTP Routes
//!
//! - Telephony callbacks (initiate, disconnect)
//! - Agent push-token registration and lookup
//! - Health check endpoints (Kubernetes-compatible)
//! - CORS support for the browser softphone

pub mod agents;
pub mod health;
pub mod initiate;

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderValue, Method},
    routing::post,
    BoxError, Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Build the complete router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. Tracing - one span per request
/// 3. Timeout - bounds the handler, store calls included; elapsed requests
///    get a JSON `TIMEOUT` error
pub fn create_api_router(state: AppState, config: &ApiConfig) -> Router {
    let callbacks = Router::new()
        .route("/initiate", post(initiate::initiate))
        .route("/bandwidth/webhooks/voice/initiate", post(initiate::initiate))
        .route(
            "/bandwidth/webhooks/voice/disconnect",
            post(initiate::disconnect),
        );

    Router::new()
        .merge(callbacks)
        .nest("/agents", agents::create_router())
        .nest("/health", health::create_router())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(config.request_timeout),
        )
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config))
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        ApiError::timeout()
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        ApiError::internal_error(err.to_string())
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// With no configured origins every origin is allowed.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: allowing configured origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}
