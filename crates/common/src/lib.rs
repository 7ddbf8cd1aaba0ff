//! Shared identifier types used across the outbox relay crates.

pub mod types;

pub use types::RecordId;
