//! Compensating saga execution.
//!
//! A [`Saga`] is an ordered list of [`Step`]s, each pairing a forward action
//! with a compensating action. The [`SagaCoordinator`] plays a saga to
//! completion with an all-or-compensated guarantee: when a forward action
//! fails, the compensations of every already-completed step run in strict
//! reverse order.
//!
//! Steps are plain data (named forward/compensate closure pairs with
//! captured context), so they can be built and tested in isolation. A saga
//! instance is single-use: `play` consumes it.

pub mod coordinator;
pub mod error;
pub mod executor;
pub mod saga;
pub mod state;
pub mod step;

pub use coordinator::{SagaCoordinator, SagaOutcome};
pub use error::StepError;
pub use executor::StepExecutor;
pub use saga::Saga;
pub use state::SagaState;
pub use step::Step;
