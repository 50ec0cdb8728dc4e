//! Bridgeline Core - Entity Types
//!
//! Pure data structures shared by every other crate: identities, agent
//! records, initiate events, call-control instructions, configuration and
//! errors. No I/O lives here.

pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod instruction;
pub mod record;

pub use config::{CoordinatorConfig, DEFAULT_PAIRING_TTL};
pub use error::{
    BridgelineError, BridgelineResult, ConfigError, DocumentError, NotificationError,
    StorageError, ValidationError,
};
pub use event::{InitiateEvent, InitiateRequest};
pub use identity::{AgentId, LegId, PairingKey, Timestamp};
pub use instruction::CallControlInstruction;
pub use record::{AgentRecord, CallMetadata, Pairing};
