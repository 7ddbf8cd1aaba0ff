//! The outbox driver.
//!
//! Scans the ledger for `Pending` records, plays a two-step saga per record
//! (claim the record, then publish with confirmation), and interprets the
//! outcome to decide the record's next status. Records whose delivery could
//! not be confirmed stay in `Publishing` and are reconciled on later passes
//! with a dedup-safe re-publish.
//!
//! Multiple workers may run concurrently: the `Pending → Publishing` CAS in
//! the ledger doubles as the lock that serializes ownership of a record, so
//! no in-process locks are needed.

pub mod backoff;
pub mod config;
pub mod driver;
pub mod error;
pub mod worker;

pub use backoff::RetryPolicy;
pub use config::RelayConfig;
pub use driver::{OutboxDriver, PassSummary};
pub use error::{RelayError, Result};
pub use worker::RelayHandle;
