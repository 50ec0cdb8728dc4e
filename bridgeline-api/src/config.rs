//! API Configuration Module
//!
//! Bind address, CORS, request timeout and store selection. Configuration is
//! loaded from environment variables with defaults suited to development.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{ApiError, ApiResult};

/// Which pairing store backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Single-process in-memory store.
    Memory,
    /// Shared PostgreSQL store.
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            other => Err(ApiError::invalid_input(format!(
                "Unknown store backend: {}",
                other
            ))),
        }
    }
}

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Listener
    // ========================================================================
    pub bind_host: String,

    pub port: u16,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Request handling
    // ========================================================================
    /// Upper bound on a single request, store calls included.
    pub request_timeout: Duration,

    pub store_backend: StoreBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(), // Empty = allow all
            cors_max_age_secs: 86400,
            request_timeout: Duration::from_secs(10),
            store_backend: StoreBackend::Memory,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `BRIDGELINE_API_BIND`: Listen host (default: 0.0.0.0)
    /// - `PORT` or `BRIDGELINE_API_PORT`: Listen port (default: 3000)
    /// - `BRIDGELINE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `BRIDGELINE_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `BRIDGELINE_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 10)
    /// - `BRIDGELINE_STORE`: `memory` or `postgres` (default: memory)
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let bind_host = std::env::var("BRIDGELINE_API_BIND").unwrap_or(defaults.bind_host);

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("BRIDGELINE_API_PORT").ok())
        {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", raw)))?,
            None => defaults.port,
        };

        let cors_origins = std::env::var("BRIDGELINE_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("BRIDGELINE_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let request_timeout = std::env::var("BRIDGELINE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let store_backend = match std::env::var("BRIDGELINE_STORE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.store_backend,
        };

        Ok(Self {
            bind_host,
            port,
            cors_origins,
            cors_max_age_secs,
            request_timeout,
            store_backend,
        })
    }

    /// Resolve the socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.port, 3000);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(
            config.bind_addr().unwrap(),
            "0.0.0.0:3000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(" Postgres ".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_store_backend_ignores_case_and_padding(
            name in proptest::sample::select(vec!["memory", "in-memory", "postgres", "postgresql", "pg"]),
            upper in proptest::bool::ANY,
            pad in 0usize..3,
        ) {
            let raw = if upper { name.to_ascii_uppercase() } else { name.to_string() };
            let padded = format!("{}{}{}", " ".repeat(pad), raw, " ".repeat(pad));
            let expected = if name.contains("mem") { StoreBackend::Memory } else { StoreBackend::Postgres };
            proptest::prop_assert_eq!(padded.parse::<StoreBackend>().unwrap(), expected);
        }
    }

    #[test]
    fn test_invalid_bind_host() {
        let config = ApiConfig {
            bind_host: "not a host".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.bind_addr().is_err());
    }
}
