//! Async pairing store trait.
//!
//! The coordinator keeps no state of its own between requests; everything it
//! needs to pair two call legs lives behind this trait. Implementations must
//! make [`PairingStore::claim_and_clear`] linearizable per record.

use ::async_trait::async_trait;
use bridgeline_core::{
    AgentId, AgentRecord, BridgelineResult, CallMetadata, LegId, Pairing, PairingKey, Timestamp,
};

/// Result of an atomic claim on a pending pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The pairing matched and has been cleared.
    ///
    /// `expires_at` is the lease of the pairing that was cleared, read in the
    /// same atomic step, so callers judge expiry on what they actually consumed.
    Claimed {
        pending_leg_id: LegId,
        expires_at: Option<Timestamp>,
    },
    /// No record exists for the agent.
    NotFound,
    /// The record's current key differs from the expected one, or the key
    /// matches but carries no pending leg. The record is left untouched.
    Conflict,
}

impl ClaimOutcome {
    pub fn claimed(pending_leg_id: LegId, expires_at: Option<Timestamp>) -> Self {
        ClaimOutcome::Claimed {
            pending_leg_id,
            expires_at,
        }
    }

    pub fn claimed_leg(self) -> Option<LegId> {
        match self {
            ClaimOutcome::Claimed { pending_leg_id, .. } => Some(pending_leg_id),
            ClaimOutcome::NotFound | ClaimOutcome::Conflict => None,
        }
    }

    /// Whether a claimed pairing's lease had already run out at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        match self {
            ClaimOutcome::Claimed { expires_at, .. } => {
                expires_at.is_some_and(|deadline| now >= deadline)
            }
            ClaimOutcome::NotFound | ClaimOutcome::Conflict => false,
        }
    }
}

/// Keyed agent record store used for call pairing.
#[async_trait]
pub trait PairingStore: Send + Sync {
    /// Get an agent record by ID.
    async fn get(&self, agent_id: &AgentId) -> BridgelineResult<Option<AgentRecord>>;

    /// Find the record currently holding `key`.
    ///
    /// When more than one record matches, the one with the lowest agent ID is
    /// returned and a warning is logged.
    async fn find_by_pairing_key(&self, key: &PairingKey) -> BridgelineResult<Option<AgentRecord>>;

    /// Atomically clear the pairing on `agent_id` if it still holds `expected`.
    ///
    /// Expired pairings are cleared like live ones; the returned lease lets the
    /// caller tell them apart. A matching key without a pending leg is reported
    /// as [`ClaimOutcome::Conflict`] and not mutated.
    async fn claim_and_clear(
        &self,
        agent_id: &AgentId,
        expected: &PairingKey,
    ) -> BridgelineResult<ClaimOutcome>;

    /// Upsert the pairing fields on an agent's own record.
    async fn set_pairing(&self, agent_id: &AgentId, pairing: &Pairing) -> BridgelineResult<()>;

    /// Upsert the metadata of the latest call aimed at an agent.
    async fn set_last_inbound_call(
        &self,
        agent_id: &AgentId,
        metadata: &CallMetadata,
    ) -> BridgelineResult<()>;

    /// Upsert the device token used to reach an agent.
    async fn set_push_token(&self, agent_id: &AgentId, token: &str) -> BridgelineResult<()>;

    /// Check if the backend is reachable.
    async fn health_check(&self) -> BridgelineResult<bool>;
}
