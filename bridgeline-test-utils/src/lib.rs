//! Bridgeline Test Utilities
//!
//! Shared test infrastructure for the Bridgeline workspace:
//! - Store wrappers that count, fail or interleave operations
//! - A push notifier that records what it was asked to send
//! - Fixtures for initiate requests
//! - Proptest generators

pub use bridgeline_storage::{ClaimOutcome, InMemoryPairingStore, PairingStore};

pub use bridgeline_core::{
    AgentId, AgentRecord, BridgelineError, BridgelineResult, CallControlInstruction,
    CallMetadata, InitiateEvent, InitiateRequest, LegId, NotificationError, Pairing, PairingKey,
    StorageError,
};

use ::async_trait::async_trait;
use bridgeline_notify::{IncomingCallNotification, PushNotifier};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// STORE OPERATIONS
// ============================================================================

/// One [`PairingStore`] method, for counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreOp {
    Get,
    FindByPairingKey,
    ClaimAndClear,
    SetPairing,
    SetLastInboundCall,
    SetPushToken,
    HealthCheck,
}

// ============================================================================
// COUNTING STORE
// ============================================================================

/// Wraps a store and counts every call per operation.
#[derive(Clone)]
pub struct CountingStore {
    inner: Arc<dyn PairingStore>,
    counts: Arc<Mutex<BTreeMap<StoreOp, usize>>>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn PairingStore>) -> Self {
        Self {
            inner,
            counts: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Counting wrapper around a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPairingStore::new()))
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.counts
            .lock()
            .map(|counts| counts.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total operations across all kinds.
    pub fn total(&self) -> usize {
        self.counts
            .lock()
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }

    fn record(&self, op: StoreOp) {
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry(op).or_insert(0) += 1;
        }
    }
}

#[async_trait]
impl PairingStore for CountingStore {
    async fn get(&self, agent_id: &AgentId) -> BridgelineResult<Option<AgentRecord>> {
        self.record(StoreOp::Get);
        self.inner.get(agent_id).await
    }

    async fn find_by_pairing_key(&self, key: &PairingKey) -> BridgelineResult<Option<AgentRecord>> {
        self.record(StoreOp::FindByPairingKey);
        self.inner.find_by_pairing_key(key).await
    }

    async fn claim_and_clear(
        &self,
        agent_id: &AgentId,
        expected: &PairingKey,
    ) -> BridgelineResult<ClaimOutcome> {
        self.record(StoreOp::ClaimAndClear);
        self.inner.claim_and_clear(agent_id, expected).await
    }

    async fn set_pairing(&self, agent_id: &AgentId, pairing: &Pairing) -> BridgelineResult<()> {
        self.record(StoreOp::SetPairing);
        self.inner.set_pairing(agent_id, pairing).await
    }

    async fn set_last_inbound_call(
        &self,
        agent_id: &AgentId,
        metadata: &CallMetadata,
    ) -> BridgelineResult<()> {
        self.record(StoreOp::SetLastInboundCall);
        self.inner.set_last_inbound_call(agent_id, metadata).await
    }

    async fn set_push_token(&self, agent_id: &AgentId, token: &str) -> BridgelineResult<()> {
        self.record(StoreOp::SetPushToken);
        self.inner.set_push_token(agent_id, token).await
    }

    async fn health_check(&self) -> BridgelineResult<bool> {
        self.record(StoreOp::HealthCheck);
        self.inner.health_check().await
    }
}

// ============================================================================
// FAILING STORE
// ============================================================================

/// Wraps a store and fails the selected operations with `StorageError::Unavailable`.
#[derive(Clone)]
pub struct FailingStore {
    inner: Arc<dyn PairingStore>,
    failing: Arc<Mutex<HashSet<StoreOp>>>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn PairingStore>) -> Self {
        Self {
            inner,
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPairingStore::new()))
    }

    /// Fail every call to `op` from now on.
    pub fn fail(&self, op: StoreOp) -> &Self {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(op);
        }
        self
    }

    pub fn heal(&self, op: StoreOp) -> &Self {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&op);
        }
        self
    }

    fn check(&self, op: StoreOp) -> BridgelineResult<()> {
        let failing = self
            .failing
            .lock()
            .map(|failing| failing.contains(&op))
            .unwrap_or(true);
        if failing {
            return Err(StorageError::Unavailable {
                reason: format!("injected failure on {:?}", op),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl PairingStore for FailingStore {
    async fn get(&self, agent_id: &AgentId) -> BridgelineResult<Option<AgentRecord>> {
        self.check(StoreOp::Get)?;
        self.inner.get(agent_id).await
    }

    async fn find_by_pairing_key(&self, key: &PairingKey) -> BridgelineResult<Option<AgentRecord>> {
        self.check(StoreOp::FindByPairingKey)?;
        self.inner.find_by_pairing_key(key).await
    }

    async fn claim_and_clear(
        &self,
        agent_id: &AgentId,
        expected: &PairingKey,
    ) -> BridgelineResult<ClaimOutcome> {
        self.check(StoreOp::ClaimAndClear)?;
        self.inner.claim_and_clear(agent_id, expected).await
    }

    async fn set_pairing(&self, agent_id: &AgentId, pairing: &Pairing) -> BridgelineResult<()> {
        self.check(StoreOp::SetPairing)?;
        self.inner.set_pairing(agent_id, pairing).await
    }

    async fn set_last_inbound_call(
        &self,
        agent_id: &AgentId,
        metadata: &CallMetadata,
    ) -> BridgelineResult<()> {
        self.check(StoreOp::SetLastInboundCall)?;
        self.inner.set_last_inbound_call(agent_id, metadata).await
    }

    async fn set_push_token(&self, agent_id: &AgentId, token: &str) -> BridgelineResult<()> {
        self.check(StoreOp::SetPushToken)?;
        self.inner.set_push_token(agent_id, token).await
    }

    async fn health_check(&self) -> BridgelineResult<bool> {
        self.check(StoreOp::HealthCheck)?;
        self.inner.health_check().await
    }
}

// ============================================================================
// INTERLEAVING STORE
// ============================================================================

/// A write that lands on the claimed record between lookup and claim.
#[derive(Debug, Clone)]
pub enum BeforeClaim {
    /// The holder opens a new first leg, replacing its pairing.
    Replace(Pairing),
    /// The record is gone by the time the claim runs.
    Vanish,
}

/// In-memory store that applies a [`BeforeClaim`] write right before every claim.
#[derive(Debug, Clone)]
pub struct InterleavingStore {
    inner: InMemoryPairingStore,
    before_claim: BeforeClaim,
}

impl InterleavingStore {
    pub fn new(before_claim: BeforeClaim) -> Self {
        Self {
            inner: InMemoryPairingStore::new(),
            before_claim,
        }
    }

    /// The wrapped store, for seeding and inspecting records.
    pub fn inner(&self) -> &InMemoryPairingStore {
        &self.inner
    }
}

#[async_trait]
impl PairingStore for InterleavingStore {
    async fn get(&self, agent_id: &AgentId) -> BridgelineResult<Option<AgentRecord>> {
        self.inner.get(agent_id).await
    }

    async fn find_by_pairing_key(&self, key: &PairingKey) -> BridgelineResult<Option<AgentRecord>> {
        self.inner.find_by_pairing_key(key).await
    }

    async fn claim_and_clear(
        &self,
        agent_id: &AgentId,
        expected: &PairingKey,
    ) -> BridgelineResult<ClaimOutcome> {
        match &self.before_claim {
            BeforeClaim::Replace(pairing) => {
                self.inner.set_pairing(agent_id, pairing).await?;
                self.inner.claim_and_clear(agent_id, expected).await
            }
            BeforeClaim::Vanish => Ok(ClaimOutcome::NotFound),
        }
    }

    async fn set_pairing(&self, agent_id: &AgentId, pairing: &Pairing) -> BridgelineResult<()> {
        self.inner.set_pairing(agent_id, pairing).await
    }

    async fn set_last_inbound_call(
        &self,
        agent_id: &AgentId,
        metadata: &CallMetadata,
    ) -> BridgelineResult<()> {
        self.inner.set_last_inbound_call(agent_id, metadata).await
    }

    async fn set_push_token(&self, agent_id: &AgentId, token: &str) -> BridgelineResult<()> {
        self.inner.set_push_token(agent_id, token).await
    }

    async fn health_check(&self) -> BridgelineResult<bool> {
        self.inner.health_check().await
    }
}

// ============================================================================
// RECORDING NOTIFIER
// ============================================================================

/// A notification the [`RecordingNotifier`] was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub token: String,
    pub notification: IncomingCallNotification,
}

/// Push notifier that records every send.
///
/// Can be told to fail every send or to stall before answering.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    attempts: Arc<AtomicUsize>,
    failure: Option<NotificationError>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send with `error`. Nothing is recorded as sent.
    pub fn failing_with(error: NotificationError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Sleep for `delay` before answering each send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Number of sends attempted, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` sends were attempted or `timeout` passes.
    pub async fn wait_for_attempts(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.attempts() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

#[async_trait]
impl PushNotifier for RecordingNotifier {
    fn provider(&self) -> &'static str {
        "recording"
    }

    async fn send(
        &self,
        token: &str,
        notification: &IncomingCallNotification,
    ) -> Result<(), NotificationError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification {
                token: token.to_string(),
                notification: notification.clone(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made requests and records.

    use super::*;

    pub const ACCOUNT_ID: &str = "9900000";
    pub const APPLICATION_ID: &str = "app-0001";

    /// A complete initiate request for one leg.
    pub fn initiate_request(caller: &str, callee: &str, leg: &str) -> InitiateRequest {
        InitiateRequest {
            account_id: Some(ACCOUNT_ID.to_string()),
            application_id: Some(APPLICATION_ID.to_string()),
            caller_id: Some(caller.to_string()),
            callee_id: Some(callee.to_string()),
            leg_id: Some(leg.to_string()),
        }
    }

    /// A platform-style leg id, unique per call.
    pub fn unique_leg_id() -> LegId {
        LegId::new(format!("c-{}", uuid::Uuid::now_v7()))
    }

    /// An agent record with a registered push token.
    pub fn agent_with_token(agent: &str, token: &str) -> AgentRecord {
        let mut record = AgentRecord::new(AgentId::from(agent));
        record.push_token = Some(token.to_string());
        record
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Bridgeline types.

    use super::*;
    use proptest::prelude::*;

    /// Phone-number-like agent identifier.
    pub fn arb_agent_id() -> impl Strategy<Value = AgentId> {
        "\\+1[2-9][0-9]{9}".prop_map(AgentId::new)
    }

    /// Two distinct agents.
    pub fn arb_agent_pair() -> impl Strategy<Value = (AgentId, AgentId)> {
        (arb_agent_id(), arb_agent_id()).prop_filter("agents must differ", |(a, b)| a != b)
    }

    pub fn arb_leg_id() -> impl Strategy<Value = LegId> {
        "c-[0-9a-f]{8}-[0-9a-f]{4}".prop_map(LegId::new)
    }

    /// A fully populated, valid initiate request.
    pub fn arb_initiate_request() -> impl Strategy<Value = InitiateRequest> {
        (
            "[0-9]{7}",
            "[a-z0-9-]{4,16}",
            arb_agent_pair(),
            arb_leg_id(),
        )
            .prop_map(|(account, application, (caller, callee), leg)| InitiateRequest {
                account_id: Some(account),
                application_id: Some(application),
                caller_id: Some(caller.into_inner()),
                callee_id: Some(callee.into_inner()),
                leg_id: Some(leg.into_inner()),
            })
    }

    /// Any instruction, with prompt text that needs XML escaping.
    pub fn arb_instruction() -> impl Strategy<Value = CallControlInstruction> {
        prop_oneof![
            (0u32..3600).prop_map(CallControlInstruction::pause),
            "[a-zA-Z0-9 .,!?&<>']{0,40}".prop_map(CallControlInstruction::speak),
            arb_leg_id().prop_map(CallControlInstruction::bridge),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_store_counts_per_op() {
        let store = CountingStore::in_memory();
        store.get(&AgentId::from("A")).await.unwrap();
        store
            .find_by_pairing_key(&PairingKey::from("B-A"))
            .await
            .unwrap();
        store.get(&AgentId::from("B")).await.unwrap();

        assert_eq!(store.count(StoreOp::Get), 2);
        assert_eq!(store.count(StoreOp::FindByPairingKey), 1);
        assert_eq!(store.count(StoreOp::SetPairing), 0);
        assert_eq!(store.total(), 3);
    }

    #[tokio::test]
    async fn test_failing_store_fails_selected_ops() {
        let store = FailingStore::in_memory();
        store.fail(StoreOp::SetPairing);

        let pairing = Pairing::new(PairingKey::from("B-A"), LegId::from("leg-1"));
        let err = store
            .set_pairing(&AgentId::from("A"), &pairing)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgelineError::StoreUnavailable(_)));
        assert!(store.get(&AgentId::from("A")).await.unwrap().is_none());

        store.heal(StoreOp::SetPairing);
        store.set_pairing(&AgentId::from("A"), &pairing).await.unwrap();
    }

    #[tokio::test]
    async fn test_recording_notifier_failure_mode() {
        let notifier = RecordingNotifier::failing_with(NotificationError::NotConfigured);
        let notification = IncomingCallNotification {
            title: "t".to_string(),
            body: "b".to_string(),
            data: bridgeline_notify::IncomingCallData {
                account_id: "a".to_string(),
                application_id: "p".to_string(),
                from_no: "A".to_string(),
                to_no: "B".to_string(),
            },
        };
        assert!(notifier.send("tok", &notification).await.is_err());
        assert_eq!(notifier.attempts(), 1);
        assert!(notifier.sent().is_empty());
    }
}
