//! Outbox record model and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RecordId;

/// The delivery status of an outbox record.
///
/// Status transitions:
/// ```text
/// Pending ──► Publishing ──┬──► Published
///     ▲            │       └──► Failed
///     └────────────┘
/// ```
///
/// `Published` and `Failed` are terminal. Records are created externally in
/// `Pending` and are never deleted by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Waiting to be picked up by a relay worker.
    #[default]
    Pending,

    /// Claimed by a worker; a publish may be in flight or unresolved.
    Publishing,

    /// Delivery confirmed by the bus (terminal state).
    Published,

    /// Compensation failed and the record needs operator attention
    /// (terminal state, excluded from automatic retry).
    Failed,
}

impl RecordStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Published | RecordStatus::Failed)
    }

    /// Returns true if `next` is a legal transition from this status.
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        matches!(
            (self, next),
            (RecordStatus::Pending, RecordStatus::Publishing)
                | (RecordStatus::Publishing, RecordStatus::Pending)
                | (RecordStatus::Publishing, RecordStatus::Published)
                | (RecordStatus::Publishing, RecordStatus::Failed)
        )
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Publishing => "publishing",
            RecordStatus::Published => "published",
            RecordStatus::Failed => "failed",
        }
    }

    /// Parses a status from its stored representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecordStatus::Pending),
            "publishing" => Some(RecordStatus::Publishing),
            "published" => Some(RecordStatus::Published),
            "failed" => Some(RecordStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single outbox record.
///
/// The id is unique and immutable; the status is mutated only through the
/// ledger's conditional transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Unique, immutable record identifier.
    pub id: RecordId,
    /// Opaque message payload.
    pub payload: Vec<u8>,
    /// Current delivery status.
    pub status: RecordStatus,
    /// Timestamp of the last status transition.
    pub updated_at: DateTime<Utc>,
}

impl OutboxRecord {
    /// Creates a new record in `Pending` state with a fresh id.
    pub fn pending(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: RecordId::new(),
            payload: payload.into(),
            status: RecordStatus::Pending,
            updated_at: Utc::now(),
        }
    }
}
