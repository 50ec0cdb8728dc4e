//! Agent records and the pairing state they carry

use crate::{AgentId, LegId, PairingKey, Timestamp};
use serde::{Deserialize, Serialize};

/// A pending first leg waiting for its reciprocal call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub key: PairingKey,
    pub pending_leg_id: LegId,
    /// Lease deadline. `None` never expires.
    pub expires_at: Option<Timestamp>,
}

impl Pairing {
    pub fn new(key: PairingKey, pending_leg_id: LegId) -> Self {
        Self {
            key,
            pending_leg_id,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Check if the lease has run out at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Metadata about the most recent call aimed at an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    pub account_id: String,
    pub application_id: String,
    pub caller_id: AgentId,
    pub callee_id: AgentId,
    pub received_at: Timestamp,
}

/// One stored agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub agent_id: AgentId,
    pub push_token: Option<String>,
    pub pairing_key: Option<PairingKey>,
    pub pending_leg_id: Option<LegId>,
    pub pairing_expires_at: Option<Timestamp>,
    pub last_inbound_call: Option<CallMetadata>,
}

impl AgentRecord {
    /// Empty record for an agent seen for the first time.
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            push_token: None,
            pairing_key: None,
            pending_leg_id: None,
            pairing_expires_at: None,
            last_inbound_call: None,
        }
    }

    /// The pending pairing, if both key and leg are present.
    pub fn pairing(&self) -> Option<Pairing> {
        match (&self.pairing_key, &self.pending_leg_id) {
            (Some(key), Some(leg)) => Some(Pairing {
                key: key.clone(),
                pending_leg_id: leg.clone(),
                expires_at: self.pairing_expires_at,
            }),
            _ => None,
        }
    }

    pub fn apply_pairing(&mut self, pairing: &Pairing) {
        self.pairing_key = Some(pairing.key.clone());
        self.pending_leg_id = Some(pairing.pending_leg_id.clone());
        self.pairing_expires_at = pairing.expires_at;
    }

    /// Clear the pairing fields, returning the leg that was pending.
    pub fn clear_pairing(&mut self) -> Option<LegId> {
        self.pairing_key = None;
        self.pairing_expires_at = None;
        self.pending_leg_id.take()
    }

    pub fn has_pairing_key(&self, key: &PairingKey) -> bool {
        self.pairing_key.as_ref() == Some(key)
    }
}
