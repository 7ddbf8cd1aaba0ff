use thiserror::Error;

use crate::PublishHandle;

/// Errors that can occur when interacting with the bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The publish call itself failed; the message was not handed to the
    /// broker. This is a definite failure and safe to compensate.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The confirmation channel is gone. Whether the delivery happened is
    /// unknowable through this handle.
    #[error("Confirmation channel closed")]
    ChannelClosed,

    /// The handle does not correspond to an outstanding publish.
    #[error("Unknown publish handle: {0}")]
    UnknownHandle(PublishHandle),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
