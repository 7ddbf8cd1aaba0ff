use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::TryStreamExt;

use crate::{OutboxRecord, RecordId, RecordStatus, Result};

/// A finite stream of outbox records. Each `scan_by_status` call produces a
/// fresh, restartable stream.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<OutboxRecord>> + Send>>;

/// Core trait for outbox record stores.
///
/// Implementations must be thread-safe (Send + Sync) and must provide
/// read-your-writes consistency for the calling process: a transition that
/// reported `true` is visible to a subsequent `get` or scan from the same
/// process.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Atomically transitions a record's status, conditional on its current
    /// status matching `expected`.
    ///
    /// Returns `true` if the transition was applied, `false` if the record's
    /// current status did not match (including when the record does not
    /// exist). A `false` result never corrupts state; it means another
    /// worker got there first or the record already moved on.
    async fn try_transition(
        &self,
        id: RecordId,
        expected: RecordStatus,
        new: RecordStatus,
    ) -> Result<bool>;

    /// Streams all records currently in the given status.
    ///
    /// The stream is finite and reflects a snapshot of the store at call
    /// time; records claimed by other workers after the scan started may
    /// still appear (callers rely on the CAS to resolve such races).
    async fn scan_by_status(&self, status: RecordStatus) -> Result<RecordStream>;

    /// Retrieves a single record by id.
    async fn get(&self, id: RecordId) -> Result<Option<OutboxRecord>>;
}

/// Extension trait providing convenience methods for ledgers.
#[async_trait]
pub trait LedgerExt: Ledger {
    /// Collects all records in the given status into a vector.
    async fn records_with_status(&self, status: RecordStatus) -> Result<Vec<OutboxRecord>> {
        self.scan_by_status(status).await?.try_collect().await
    }

    /// Returns the current status of a record, if it exists.
    async fn status_of(&self, id: RecordId) -> Result<Option<RecordStatus>> {
        Ok(self.get(id).await?.map(|r| r.status))
    }
}

// Blanket implementation for all Ledger implementations
impl<T: Ledger + ?Sized> LedgerExt for T {}
