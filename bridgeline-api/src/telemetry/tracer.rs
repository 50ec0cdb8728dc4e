//! Tracing Subscriber Initialization
//!
//! JSON logs filtered through `RUST_LOG`, or plain text for local runs.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

const DEFAULT_FILTER: &str = "bridgeline_api=debug,tower_http=debug,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("BRIDGELINE_SERVICE_NAME")
                .unwrap_or_else(|_| "bridgeline-api".to_string()),
            environment: std::env::var("BRIDGELINE_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            json: std::env::var("BRIDGELINE_LOG_FORMAT")
                .map(|s| !s.eq_ignore_ascii_case("text"))
                .unwrap_or(true),
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup, before anything logs.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let json_layer = config.json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!config.json).then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        environment = config.environment,
        json = config.json,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_telemetry_config_from_env() {
        let _name = EnvVarGuard::set("BRIDGELINE_SERVICE_NAME", None);
        let _format = EnvVarGuard::set("BRIDGELINE_LOG_FORMAT", None);
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "bridgeline-api");
        assert!(config.json);
        assert_eq!(config.default_filter, DEFAULT_FILTER);

        let _format = EnvVarGuard::set("BRIDGELINE_LOG_FORMAT", Some("TEXT"));
        assert!(!TelemetryConfig::default().json);
    }
}
