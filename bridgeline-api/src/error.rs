//! Error Types for the Bridgeline API
//!
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bridgeline_core::{BridgelineError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Initiate event missing a field or carrying a blank one
    InvalidEvent,

    /// Request body could not be decoded
    InvalidInput,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    AgentNotFound,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    StoreUnavailable,

    ConnectionPoolExhausted,

    Timeout,

    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidEvent | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::AgentNotFound => StatusCode::NOT_FOUND,

            ErrorCode::StoreUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidEvent => "Initiate event is invalid",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::AgentNotFound => "Agent not found",
            ErrorCode::StoreUnavailable => "Pairing store unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// API error returned as the JSON body of a failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn invalid_event(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidEvent, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn agent_not_found(agent_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::AgentNotFound,
            format!("Agent {} not found", agent_id),
        )
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }

    pub fn timeout() -> Self {
        Self::from_code(ErrorCode::Timeout)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<BridgelineError> for ApiError {
    fn from(err: BridgelineError) -> Self {
        match err {
            BridgelineError::InvalidEvent(e) => ApiError::invalid_event(e.to_string()),
            BridgelineError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Pairing store failure");
                ApiError::store_unavailable(e.to_string())
            }
            BridgelineError::Config(e) => ApiError::internal_error(e.to_string()),
            BridgelineError::Notification(e) => ApiError::internal_error(e.to_string()),
            BridgelineError::Document(e) => {
                tracing::error!(error = %e, "Failed to build call-control document");
                ApiError::internal_error(e.to_string())
            }
        }
    }
}

/// Convert from tokio_postgres::Error to ApiError.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);

        // Generic message, details stay in the log
        ApiError::store_unavailable("Database operation failed")
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::store_unavailable("Database connection pool is closed")
            }
            _ => ApiError::store_unavailable("Failed to acquire database connection"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

/// Map a database error into the store error the core crates understand.
pub(crate) fn storage_error(context: &str, err: impl fmt::Display) -> BridgelineError {
    BridgelineError::StoreUnavailable(StorageError::Unavailable {
        reason: format!("{}: {}", context, err),
    })
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bridgeline_core::ValidationError;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidEvent.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::AgentNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::StoreUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_from_bridgeline_error() {
        let err: ApiError = BridgelineError::from(ValidationError::RequiredFieldMissing {
            field: "callerId".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::InvalidEvent);
        assert!(err.message.contains("callerId"));

        let err: ApiError = BridgelineError::from(StorageError::LockPoisoned).into();
        assert_eq!(err.code, ErrorCode::StoreUnavailable);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::agent_not_found("+15550001");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("AGENT_NOT_FOUND"));
        assert!(json.contains("+15550001"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::store_unavailable("Connection refused");
        let display = format!("{}", err);

        assert!(display.contains("StoreUnavailable"));
        assert!(display.contains("Connection refused"));
    }
}
