//! Bridgeline Coordinator - Call-Leg Pairing
//!
//! Decides for each initiate event whether it opens a new call or completes
//! one that is already waiting, and returns the call-control instructions for
//! that leg. All pairing state lives in the injected
//! [`PairingStore`](bridgeline_storage::PairingStore); the coordinator itself
//! is stateless and safe to share across requests.

mod coordinator;

pub use coordinator::Coordinator;
