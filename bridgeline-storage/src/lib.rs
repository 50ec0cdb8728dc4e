//! Bridgeline Storage - Pairing Store Trait and In-Memory Implementation
//!
//! Defines the storage abstraction the coordinator pairs call legs through.
//! The PostgreSQL implementation lives in bridgeline-api.

pub mod memory;
pub mod store;

pub use memory::InMemoryPairingStore;
pub use store::{ClaimOutcome, PairingStore};
