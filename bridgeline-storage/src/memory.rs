//! In-memory pairing store.
//!
//! Records and the pairing-key index share one lock, so every operation,
//! including the claim, is atomic with respect to every other.

use crate::{ClaimOutcome, PairingStore};
use ::async_trait::async_trait;
use bridgeline_core::{
    AgentId, AgentRecord, BridgelineResult, CallMetadata, Pairing, PairingKey, StorageError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<AgentId, AgentRecord>,
    by_pairing_key: BTreeMap<PairingKey, BTreeSet<AgentId>>,
}

impl Tables {
    fn record_mut(&mut self, agent_id: &AgentId) -> &mut AgentRecord {
        self.records
            .entry(agent_id.clone())
            .or_insert_with(|| AgentRecord::new(agent_id.clone()))
    }

    fn unindex(&mut self, key: &PairingKey, agent_id: &AgentId) {
        if let Some(holders) = self.by_pairing_key.get_mut(key) {
            holders.remove(agent_id);
            if holders.is_empty() {
                self.by_pairing_key.remove(key);
            }
        }
    }

    fn index(&mut self, key: &PairingKey, agent_id: &AgentId) {
        self.by_pairing_key
            .entry(key.clone())
            .or_default()
            .insert(agent_id.clone());
    }
}

/// In-memory pairing store for tests and single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPairingStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryPairingStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, replacing any existing one.
    pub fn insert(&self, record: AgentRecord) -> BridgelineResult<()> {
        let mut tables = self.write()?;
        if let Some(old_key) = tables
            .records
            .get(&record.agent_id)
            .and_then(|r| r.pairing_key.clone())
        {
            tables.unindex(&old_key, &record.agent_id);
        }
        if let Some(key) = &record.pairing_key {
            tables.index(key, &record.agent_id);
        }
        tables.records.insert(record.agent_id.clone(), record);
        Ok(())
    }

    /// Get count of stored records.
    pub fn record_count(&self) -> usize {
        self.tables.read().map(|t| t.records.len()).unwrap_or(0)
    }

    /// Get count of records holding a pairing key.
    pub fn pending_pairing_count(&self) -> usize {
        self.tables
            .read()
            .map(|t| t.by_pairing_key.values().map(BTreeSet::len).sum())
            .unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables.write().map_err(|_| StorageError::LockPoisoned)
    }
}

#[async_trait]
impl PairingStore for InMemoryPairingStore {
    async fn get(&self, agent_id: &AgentId) -> BridgelineResult<Option<AgentRecord>> {
        let tables = self.read()?;
        Ok(tables.records.get(agent_id).cloned())
    }

    async fn find_by_pairing_key(&self, key: &PairingKey) -> BridgelineResult<Option<AgentRecord>> {
        let tables = self.read()?;
        let Some(holders) = tables.by_pairing_key.get(key) else {
            return Ok(None);
        };
        if holders.len() > 1 {
            tracing::warn!(
                pairing_key = %key,
                holders = holders.len(),
                "Pairing key held by more than one record, using the first"
            );
        }
        Ok(holders
            .iter()
            .next()
            .and_then(|agent_id| tables.records.get(agent_id))
            .cloned())
    }

    async fn claim_and_clear(
        &self,
        agent_id: &AgentId,
        expected: &PairingKey,
    ) -> BridgelineResult<ClaimOutcome> {
        let mut tables = self.write()?;
        let Some(record) = tables.records.get_mut(agent_id) else {
            return Ok(ClaimOutcome::NotFound);
        };
        if !record.has_pairing_key(expected) {
            return Ok(ClaimOutcome::Conflict);
        }
        if record.pending_leg_id.is_none() {
            tracing::warn!(agent_id = %agent_id, pairing_key = %expected, "Pairing key had no pending leg");
            return Ok(ClaimOutcome::Conflict);
        }

        let expires_at = record.pairing_expires_at;
        let leg = record.clear_pairing();
        tables.unindex(expected, agent_id);

        Ok(match leg {
            Some(pending_leg_id) => ClaimOutcome::claimed(pending_leg_id, expires_at),
            None => ClaimOutcome::Conflict,
        })
    }

    async fn set_pairing(&self, agent_id: &AgentId, pairing: &Pairing) -> BridgelineResult<()> {
        let mut tables = self.write()?;
        let previous = tables.record_mut(agent_id).pairing_key.clone();
        if let Some(old_key) = previous {
            tables.unindex(&old_key, agent_id);
        }
        tables.record_mut(agent_id).apply_pairing(pairing);
        tables.index(&pairing.key, agent_id);
        Ok(())
    }

    async fn set_last_inbound_call(
        &self,
        agent_id: &AgentId,
        metadata: &CallMetadata,
    ) -> BridgelineResult<()> {
        let mut tables = self.write()?;
        tables.record_mut(agent_id).last_inbound_call = Some(metadata.clone());
        Ok(())
    }

    async fn set_push_token(&self, agent_id: &AgentId, token: &str) -> BridgelineResult<()> {
        let mut tables = self.write()?;
        tables.record_mut(agent_id).push_token = Some(token.to_string());
        Ok(())
    }

    async fn health_check(&self) -> BridgelineResult<bool> {
        Ok(!self.tables.is_poisoned())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bridgeline_core::LegId;
    use chrono::Utc;

    fn agent(id: &str) -> AgentId {
        AgentId::from(id)
    }

    fn pairing(key: &str, leg: &str) -> Pairing {
        Pairing::new(PairingKey::from(key), LegId::from(leg))
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryPairingStore::new();
        assert!(store.get(&agent("A")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_pairing_creates_record_and_index() {
        let store = InMemoryPairingStore::new();
        store.set_pairing(&agent("A"), &pairing("B-A", "leg-100")).await.unwrap();

        let found = store
            .find_by_pairing_key(&PairingKey::from("B-A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.agent_id, agent("A"));
        assert_eq!(found.pending_leg_id, Some(LegId::from("leg-100")));
        assert_eq!(store.pending_pairing_count(), 1);
    }

    #[tokio::test]
    async fn test_set_pairing_replaces_previous_key() {
        let store = InMemoryPairingStore::new();
        store.set_pairing(&agent("A"), &pairing("B-A", "leg-1")).await.unwrap();
        store.set_pairing(&agent("A"), &pairing("C-A", "leg-2")).await.unwrap();

        assert!(store
            .find_by_pairing_key(&PairingKey::from("B-A"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.pending_pairing_count(), 1);
    }

    #[tokio::test]
    async fn test_claim_and_clear_once() {
        let store = InMemoryPairingStore::new();
        let key = PairingKey::from("B-A");
        store.set_pairing(&agent("A"), &pairing("B-A", "leg-100")).await.unwrap();

        let first = store.claim_and_clear(&agent("A"), &key).await.unwrap();
        assert_eq!(first, ClaimOutcome::claimed(LegId::from("leg-100"), None));

        let second = store.claim_and_clear(&agent("A"), &key).await.unwrap();
        assert_eq!(second, ClaimOutcome::Conflict);

        let record = store.get(&agent("A")).await.unwrap().unwrap();
        assert!(record.pairing_key.is_none());
        assert!(record.pending_leg_id.is_none());
        assert!(store.find_by_pairing_key(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_missing_record() {
        let store = InMemoryPairingStore::new();
        let outcome = store
            .claim_and_clear(&agent("ghost"), &PairingKey::from("B-A"))
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_claim_with_wrong_key_does_not_mutate() {
        let store = InMemoryPairingStore::new();
        store.set_pairing(&agent("A"), &pairing("B-A", "leg-100")).await.unwrap();

        let outcome = store
            .claim_and_clear(&agent("A"), &PairingKey::from("C-A"))
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Conflict);

        let record = store.get(&agent("A")).await.unwrap().unwrap();
        assert_eq!(record.pairing_key, Some(PairingKey::from("B-A")));
    }

    #[tokio::test]
    async fn test_claim_key_without_leg_is_conflict_and_untouched() {
        let store = InMemoryPairingStore::new();
        let mut record = AgentRecord::new(agent("A"));
        record.pairing_key = Some(PairingKey::from("B-A"));
        store.insert(record).unwrap();

        let outcome = store
            .claim_and_clear(&agent("A"), &PairingKey::from("B-A"))
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Conflict);
        assert_eq!(store.pending_pairing_count(), 1);
        let record = store.get(&agent("A")).await.unwrap().unwrap();
        assert_eq!(record.pairing_key, Some(PairingKey::from("B-A")));
    }

    #[tokio::test]
    async fn test_claim_reports_lease_of_cleared_pairing() {
        let store = InMemoryPairingStore::new();
        let deadline = Utc::now() - chrono::Duration::seconds(5);
        let stale = pairing("B-A", "leg-old").with_expiry(deadline);
        store.set_pairing(&agent("A"), &stale).await.unwrap();

        let outcome = store
            .claim_and_clear(&agent("A"), &PairingKey::from("B-A"))
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::claimed(LegId::from("leg-old"), Some(deadline)));
        assert!(outcome.is_expired_at(Utc::now()));
        assert!(!outcome.is_expired_at(deadline - chrono::Duration::seconds(1)));
        assert_eq!(store.pending_pairing_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_holders_resolve_to_lowest_id() {
        let store = InMemoryPairingStore::new();
        store.set_pairing(&agent("Z"), &pairing("B-A", "leg-z")).await.unwrap();
        store.set_pairing(&agent("M"), &pairing("B-A", "leg-m")).await.unwrap();

        let found = store
            .find_by_pairing_key(&PairingKey::from("B-A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.agent_id, agent("M"));
    }

    #[tokio::test]
    async fn test_metadata_and_token_do_not_touch_pairing() {
        let store = InMemoryPairingStore::new();
        store.set_pairing(&agent("B"), &pairing("A-B", "leg-1")).await.unwrap();

        let metadata = CallMetadata {
            account_id: "acct".to_string(),
            application_id: "app".to_string(),
            caller_id: agent("A"),
            callee_id: agent("B"),
            received_at: Utc::now(),
        };
        store.set_last_inbound_call(&agent("B"), &metadata).await.unwrap();
        store.set_push_token(&agent("B"), "device-token").await.unwrap();

        let record = store.get(&agent("B")).await.unwrap().unwrap();
        assert_eq!(record.push_token.as_deref(), Some("device-token"));
        assert_eq!(record.last_inbound_call, Some(metadata));
        assert_eq!(record.pairing_key, Some(PairingKey::from("A-B")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_succeed_once() {
        let store = Arc::new(InMemoryPairingStore::new());
        store.set_pairing(&agent("A"), &pairing("B-A", "leg-100")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .claim_and_clear(&AgentId::from("A"), &PairingKey::from("B-A"))
                    .await
                    .unwrap()
            }));
        }

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap().claimed_leg().is_some() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = InMemoryPairingStore::new();
        assert!(store.health_check().await.unwrap());
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
