//! Call pairing coordinator.
//!
//! Classifies each initiate event as a first or second leg against the
//! pairing store and returns the call-control instructions for that leg.

use bridgeline_core::{
    AgentId, AgentRecord, BridgelineResult, CallControlInstruction, CallMetadata,
    CoordinatorConfig, InitiateEvent, InitiateRequest, LegId, Pairing, PairingKey, Timestamp,
    ValidationError,
};
use bridgeline_notify::{IncomingCallNotification, NotificationDispatcher};
use bridgeline_storage::{ClaimOutcome, PairingStore};
use chrono::Utc;
use std::sync::Arc;

/// Pairs the two legs of a call through a shared [`PairingStore`].
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn PairingStore>,
    dispatcher: NotificationDispatcher,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn PairingStore>,
        dispatcher: NotificationDispatcher,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn PairingStore> {
        &self.store
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Handle one initiate event and return the instructions for its leg.
    ///
    /// A second leg whose reciprocal first leg is still pending gets a bridge
    /// to that leg. Anything else is treated as a first leg: its pairing is
    /// recorded on the caller, the callee is notified in the background, and
    /// the leg is put on hold. The returned sequence is never empty.
    ///
    /// # Errors
    /// - `InvalidEvent` if a field is missing or blank. The store is not touched.
    /// - `StoreUnavailable` if the lookup, the claim or the pairing write fails.
    pub async fn coordinate(
        &self,
        request: InitiateRequest,
    ) -> BridgelineResult<Vec<CallControlInstruction>> {
        let event = InitiateEvent::try_from(request).map_err(|e| {
            tracing::warn!(error = %e, "Rejected initiate event");
            e
        })?;

        if event.is_self_call() {
            tracing::warn!(
                caller_id = %event.caller_id,
                leg_id = %event.leg_id,
                "Initiate event calls its own agent"
            );
        }

        let now = Utc::now();
        let lookup = PairingKey::between(&event.caller_id, &event.callee_id);

        if let Some(pending_leg_id) = self.claim_pending_leg(&event, &lookup, now).await? {
            tracing::info!(
                caller_id = %event.caller_id,
                callee_id = %event.callee_id,
                leg_id = %event.leg_id,
                pending_leg_id = %pending_leg_id,
                "Bridging second leg"
            );
            return Ok(self.bridge_instructions(pending_leg_id));
        }

        self.open_first_leg(&event, now).await?;
        Ok(self.hold_instructions())
    }

    /// Register the device token used to notify an agent of incoming calls.
    pub async fn register_push_token(&self, agent_id: &str, token: &str) -> BridgelineResult<()> {
        let agent_id = AgentId::new(non_blank(agent_id, "agentId")?);
        let token = non_blank(token, "token")?;
        self.store.set_push_token(&agent_id, &token).await?;
        tracing::info!(agent_id = %agent_id, "Push token registered");
        Ok(())
    }

    pub async fn agent(&self, agent_id: &str) -> BridgelineResult<Option<AgentRecord>> {
        let agent_id = non_blank(agent_id, "agentId")?;
        self.store.get(&AgentId::new(agent_id)).await
    }

    // ========================================================================
    // SECOND LEG
    // ========================================================================

    async fn claim_pending_leg(
        &self,
        event: &InitiateEvent,
        lookup: &PairingKey,
        now: Timestamp,
    ) -> BridgelineResult<Option<LegId>> {
        let Some(holder) = self.store.find_by_pairing_key(lookup).await? else {
            return Ok(None);
        };

        // Expiry is judged on the pairing the claim actually cleared, not on the
        // lookup snapshot: the holder may have opened a fresh leg in between.
        let outcome = self.store.claim_and_clear(&holder.agent_id, lookup).await?;

        if outcome.is_expired_at(now) {
            tracing::info!(
                holder = %holder.agent_id,
                pairing_key = %lookup,
                leg_id = %event.leg_id,
                "Cleared expired pairing"
            );
            return Ok(None);
        }

        match outcome {
            ClaimOutcome::Claimed { pending_leg_id, .. } => Ok(Some(pending_leg_id)),
            ClaimOutcome::NotFound | ClaimOutcome::Conflict => {
                tracing::debug!(
                    holder = %holder.agent_id,
                    pairing_key = %lookup,
                    leg_id = %event.leg_id,
                    outcome = ?outcome,
                    "Pairing claimed elsewhere, treating as first leg"
                );
                Ok(None)
            }
        }
    }

    fn bridge_instructions(&self, pending_leg_id: LegId) -> Vec<CallControlInstruction> {
        vec![
            CallControlInstruction::pause(self.config.bridge_pause_secs),
            CallControlInstruction::speak(self.config.bridge_prompt.clone()),
            CallControlInstruction::bridge(pending_leg_id),
        ]
    }

    // ========================================================================
    // FIRST LEG
    // ========================================================================

    async fn open_first_leg(&self, event: &InitiateEvent, now: Timestamp) -> BridgelineResult<()> {
        // Stored under the key the reply leg (callee -> caller) will compute.
        let key = PairingKey::between(&event.callee_id, &event.caller_id);
        let mut pairing = Pairing::new(key, event.leg_id.clone());
        if let Some(ttl) = self.config.pairing_ttl {
            match chrono::Duration::from_std(ttl) {
                Ok(ttl) => pairing = pairing.with_expiry(now + ttl),
                Err(e) => {
                    tracing::warn!(error = %e, "Pairing TTL out of range, pairing will not expire")
                }
            }
        }

        self.store.set_pairing(&event.caller_id, &pairing).await?;
        tracing::info!(
            caller_id = %event.caller_id,
            callee_id = %event.callee_id,
            leg_id = %event.leg_id,
            pairing_key = %pairing.key,
            "Opened first leg"
        );

        let metadata = event.call_metadata(now);
        if let Err(e) = self
            .store
            .set_last_inbound_call(&event.callee_id, &metadata)
            .await
        {
            tracing::warn!(
                callee_id = %event.callee_id,
                error = %e,
                "Failed to record inbound call metadata"
            );
        }

        self.notify_callee(&metadata).await;
        Ok(())
    }

    async fn notify_callee(&self, metadata: &CallMetadata) {
        let callee = match self.store.get(&metadata.callee_id).await {
            Ok(callee) => callee,
            Err(e) => {
                tracing::warn!(
                    callee_id = %metadata.callee_id,
                    error = %e,
                    "Failed to look up callee for notification"
                );
                return;
            }
        };

        match callee.and_then(|record| record.push_token) {
            Some(token) if !token.trim().is_empty() => {
                // Detached: the handle is dropped and the task logs its own outcome.
                let _ = self
                    .dispatcher
                    .dispatch(token, IncomingCallNotification::for_call(metadata));
                tracing::debug!(
                    callee_id = %metadata.callee_id,
                    provider = self.dispatcher.provider(),
                    "Incoming call notification dispatched"
                );
            }
            _ => {
                tracing::debug!(
                    callee_id = %metadata.callee_id,
                    "Callee has no push token, skipping notification"
                );
            }
        }
    }

    fn hold_instructions(&self) -> Vec<CallControlInstruction> {
        vec![
            CallControlInstruction::speak(self.config.hold_prompt.clone()),
            CallControlInstruction::pause(self.config.hold_pause_secs),
        ]
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn non_blank(value: &str, field: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must not be blank".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// TESTS
// ============================================================================
