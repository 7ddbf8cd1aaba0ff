//! Durable storage of outbox records.
//!
//! A [`Ledger`] holds `{id, payload, status}` records and supports exactly one
//! mutation path: an atomic compare-and-set status transition keyed on the
//! record id and the expected prior status. The CAS doubles as a distributed
//! lock: only one worker can win a `Pending → Publishing` transition for a
//! given record.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::RecordId;
pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use record::{OutboxRecord, RecordStatus};
pub use store::{Ledger, LedgerExt, RecordStream};
