use bus::BusError;
use ledger::LedgerError;
use thiserror::Error;

/// Errors that can abort a driver scan pass.
///
/// Per-record failures never surface here; they are absorbed into the pass
/// summary so one stuck record cannot block the others. Only failures of
/// the scan itself propagate, and the next pass retries them.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Ledger error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Bus error.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
