//! Error types for Bridgeline operations

use thiserror::Error;

/// Pairing store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query on {index_name} failed: {reason}")]
    QueryFailed { index_name: String, reason: String },

    #[error("Write failed for agent {agent_id}: {reason}")]
    WriteFailed { agent_id: String, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Corrupt record for agent {agent_id}: {reason}")]
    CorruptRecord { agent_id: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Push notification delivery errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("No push transport configured")]
    NotConfigured,

    #[error("Push request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Push transport error for {provider}: {reason}")]
    Transport { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl NotificationError {
    /// Whether another delivery attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotificationError::Transport { .. } => true,
            NotificationError::RequestFailed { status, .. } => *status == 429 || *status >= 500,
            NotificationError::NotConfigured | NotificationError::InvalidResponse { .. } => false,
        }
    }
}

/// Call-control document errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Failed to write document: {reason}")]
    WriteFailed { reason: String },

    #[error("Failed to parse document: {reason}")]
    ParseFailed { reason: String },

    #[error("Unknown element: {element}")]
    UnknownElement { element: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Bridgeline errors.
#[derive(Debug, Clone, Error)]
pub enum BridgelineError {
    #[error("Invalid event: {0}")]
    InvalidEvent(#[from] ValidationError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    #[error("Notification failure: {0}")]
    Notification(#[from] NotificationError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Bridgeline operations.
pub type BridgelineResult<T> = Result<T, BridgelineError>;

// =============================================================================
// TESTS
// =============================================================================
