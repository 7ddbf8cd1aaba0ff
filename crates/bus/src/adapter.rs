use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Correlates a publish call with the confirmation it may later produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublishHandle(u64);

impl PublishHandle {
    /// Creates a handle from a raw sequence number.
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence number.
    pub fn seq(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PublishHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of waiting for a delivery confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmStatus {
    /// The broker acknowledged the delivery.
    Acknowledged,

    /// The broker definitively refused the message. Safe to treat as a
    /// failure and compensate.
    Rejected,

    /// No confirmation arrived within the allotted wait. The delivery may
    /// still have happened; callers must treat this as indeterminate.
    TimedOut,
}

impl ConfirmStatus {
    /// Returns true if the delivery was acknowledged.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, ConfirmStatus::Acknowledged)
    }
}

/// Trait for message bus implementations.
///
/// All implementations must be thread-safe (Send + Sync); a single bus may
/// be shared by concurrent relay workers.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Publishes a payload to a named durable destination.
    ///
    /// Returning `Ok` means the message was handed to the broker and will be
    /// delivered at least once. Returning `Err` means it was not handed over
    /// at all.
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<PublishHandle>;

    /// Waits up to `timeout` for the confirmation correlated with `handle`.
    ///
    /// A timeout abandons only the wait, never the publish itself. The
    /// message may still be in flight, which is why `TimedOut` is a normal
    /// return value and not an error.
    async fn await_confirmation(
        &self,
        handle: PublishHandle,
        timeout: Duration,
    ) -> Result<ConfirmStatus>;
}
