use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    LedgerError, OutboxRecord, RecordId, RecordStatus, Result,
    store::{Ledger, RecordStream},
};

#[derive(Default)]
struct InMemoryState {
    records: HashMap<RecordId, OutboxRecord>,
    /// When set, every operation fails with `LedgerError::Unavailable`.
    unavailable: bool,
    /// When set, transitions *to* this status fail with an error. Used to
    /// simulate a store that dies mid-compensation.
    fail_transition_to: Option<RecordStatus>,
}

/// In-memory ledger implementation for testing.
///
/// Provides the same interface as the PostgreSQL implementation, plus
/// failure-injection knobs for exercising the driver's error taxonomy.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, replacing any existing record with the same id.
    pub async fn insert(&self, record: OutboxRecord) {
        self.state.write().await.records.insert(record.id, record);
    }

    /// Inserts a fresh `Pending` record with the given payload and returns
    /// its id.
    pub async fn insert_pending(&self, payload: impl Into<Vec<u8>>) -> RecordId {
        let record = OutboxRecord::pending(payload);
        let id = record.id;
        self.insert(record).await;
        id
    }

    /// Returns the total number of records stored.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Simulates a store outage: every operation fails until cleared.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Makes transitions *to* the given status fail with an error,
    /// e.g. `Some(RecordStatus::Pending)` to break rollbacks.
    pub async fn set_fail_transition_to(&self, status: Option<RecordStatus>) {
        self.state.write().await.fail_transition_to = status;
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn try_transition(
        &self,
        id: RecordId,
        expected: RecordStatus,
        new: RecordStatus,
    ) -> Result<bool> {
        let mut state = self.state.write().await;

        if state.unavailable {
            return Err(LedgerError::Unavailable("simulated outage".to_string()));
        }
        if state.fail_transition_to == Some(new) {
            return Err(LedgerError::Unavailable(format!(
                "simulated failure transitioning to {new}"
            )));
        }

        let Some(record) = state.records.get_mut(&id) else {
            return Ok(false);
        };
        if record.status != expected {
            return Ok(false);
        }

        record.status = new;
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn scan_by_status(&self, status: RecordStatus) -> Result<RecordStream> {
        use futures_util::stream;

        let state = self.state.read().await;
        if state.unavailable {
            return Err(LedgerError::Unavailable("simulated outage".to_string()));
        }

        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.updated_at);

        Ok(Box::pin(stream::iter(records.into_iter().map(Ok))))
    }

    async fn get(&self, id: RecordId) -> Result<Option<OutboxRecord>> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(LedgerError::Unavailable("simulated outage".to_string()));
        }
        Ok(state.records.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedgerExt;

    #[tokio::test]
    async fn transition_succeeds_on_matching_status() {
        let ledger = InMemoryLedger::new();
        let id = ledger.insert_pending(b"hello".to_vec()).await;

        let won = ledger
            .try_transition(id, RecordStatus::Pending, RecordStatus::Publishing)
            .await
            .unwrap();
        assert!(won);
        assert_eq!(
            ledger.status_of(id).await.unwrap(),
            Some(RecordStatus::Publishing)
        );
    }

    #[tokio::test]
    async fn transition_fails_on_mismatched_status() {
        let ledger = InMemoryLedger::new();
        let id = ledger.insert_pending(b"hello".to_vec()).await;

        let won = ledger
            .try_transition(id, RecordStatus::Publishing, RecordStatus::Published)
            .await
            .unwrap();
        assert!(!won);
        // Status unchanged
        assert_eq!(
            ledger.status_of(id).await.unwrap(),
            Some(RecordStatus::Pending)
        );
    }

    #[tokio::test]
    async fn transition_fails_on_missing_record() {
        let ledger = InMemoryLedger::new();
        let won = ledger
            .try_transition(
                RecordId::new(),
                RecordStatus::Pending,
                RecordStatus::Publishing,
            )
            .await
            .unwrap();
        assert!(!won);
    }

    #[tokio::test]
    async fn concurrent_claims_have_exactly_one_winner() {
        let ledger = InMemoryLedger::new();
        let id = ledger.insert_pending(b"contested".to_vec()).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .try_transition(id, RecordStatus::Pending, RecordStatus::Publishing)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn scan_filters_by_status() {
        let ledger = InMemoryLedger::new();
        let pending = ledger.insert_pending(b"a".to_vec()).await;
        let claimed = ledger.insert_pending(b"b".to_vec()).await;
        ledger
            .try_transition(claimed, RecordStatus::Pending, RecordStatus::Publishing)
            .await
            .unwrap();

        let records = ledger
            .records_with_status(RecordStatus::Pending)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, pending);

        let publishing = ledger
            .records_with_status(RecordStatus::Publishing)
            .await
            .unwrap();
        assert_eq!(publishing.len(), 1);
        assert_eq!(publishing[0].id, claimed);
    }

    #[tokio::test]
    async fn unavailable_ledger_errors_without_mutating() {
        let ledger = InMemoryLedger::new();
        let id = ledger.insert_pending(b"x".to_vec()).await;
        ledger.set_unavailable(true).await;

        let result = ledger
            .try_transition(id, RecordStatus::Pending, RecordStatus::Publishing)
            .await;
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));

        ledger.set_unavailable(false).await;
        assert_eq!(
            ledger.status_of(id).await.unwrap(),
            Some(RecordStatus::Pending)
        );
    }

    #[tokio::test]
    async fn fail_transition_to_only_breaks_matching_target() {
        let ledger = InMemoryLedger::new();
        let id = ledger.insert_pending(b"x".to_vec()).await;
        ledger
            .set_fail_transition_to(Some(RecordStatus::Pending))
            .await;

        // Claim still works
        assert!(
            ledger
                .try_transition(id, RecordStatus::Pending, RecordStatus::Publishing)
                .await
                .unwrap()
        );

        // Rollback does not
        let rollback = ledger
            .try_transition(id, RecordStatus::Publishing, RecordStatus::Pending)
            .await;
        assert!(matches!(rollback, Err(LedgerError::Unavailable(_))));
    }
}
