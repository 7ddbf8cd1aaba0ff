//! Message bus abstraction with publisher confirms.
//!
//! The bus guarantees at-least-once delivery to a named durable destination
//! once a publish call returns without a transport error. It does *not*
//! guarantee that a delivery confirmation will ever arrive, even when the
//! delivery happened: a confirmation wait that times out is indeterminate,
//! never a definite failure.

pub mod adapter;
pub mod error;
pub mod memory;

pub use adapter::{Bus, ConfirmStatus, PublishHandle};
pub use error::{BusError, Result};
pub use memory::{ConfirmMode, InMemoryBus};
