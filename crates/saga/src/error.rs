//! Saga error types.

use thiserror::Error;

/// Why a step action did not succeed.
///
/// The distinction matters to the coordinator: a `Failed` forward action is
/// definite and triggers compensation of earlier steps, while an
/// `Indeterminate` one may have taken effect, so running compensations
/// could undo work that actually happened.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    /// The action definitely failed; nothing of it needs to be kept.
    #[error("{0}")]
    Failed(String),

    /// The action's effect cannot be confirmed either way.
    #[error("outcome indeterminate: {0}")]
    Indeterminate(String),
}

impl StepError {
    /// Creates a definite failure.
    pub fn failed(cause: impl Into<String>) -> Self {
        StepError::Failed(cause.into())
    }

    /// Creates an indeterminate outcome.
    pub fn indeterminate(cause: impl Into<String>) -> Self {
        StepError::Indeterminate(cause.into())
    }

    /// Returns the failure reason.
    pub fn cause(&self) -> &str {
        match self {
            StepError::Failed(cause) | StepError::Indeterminate(cause) => cause,
        }
    }
}
