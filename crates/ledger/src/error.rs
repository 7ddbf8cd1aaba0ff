use thiserror::Error;

use crate::RecordId;

/// Errors that can occur when interacting with the ledger.
///
/// Note that a CAS transition losing its race is *not* an error; the
/// transition reports `false` instead. Errors here mean the store itself
/// could not be reached or returned something unusable; the driver treats
/// them as transient and retries with backoff without touching the record's
/// status.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The record was not found in the ledger.
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    /// The store returned a status string the record model does not know.
    #[error("Invalid status value in store: {0}")]
    InvalidStatus(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store is unavailable (simulated outages in tests use this).
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
