//! Saga definition: an ordered, single-use sequence of steps.

use crate::state::SagaState;
use crate::step::Step;

/// An ordered sequence of steps played with an all-or-compensated guarantee.
///
/// A saga instance is single-use: [`SagaCoordinator::play`] consumes it.
/// One instance is built per in-flight unit of work, so no state is shared
/// across concurrent sagas.
///
/// [`SagaCoordinator::play`]: crate::SagaCoordinator::play
pub struct Saga {
    name: String,
    steps: Vec<Step>,
    state: SagaState,
}

impl Saga {
    /// Creates an empty saga with a diagnostic name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            state: SagaState::NotStarted,
        }
    }

    /// Appends a step, builder style. Declaration order is execution order.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Returns the saga's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the saga has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the saga's current lifecycle state.
    pub fn state(&self) -> SagaState {
        self.state
    }

    pub(crate) fn step_at(&self, index: usize) -> &Step {
        &self.steps[index]
    }

    pub(crate) fn set_state(&mut self, state: SagaState) {
        tracing::debug!(saga = %self.name, from = %self.state, to = %state, "saga state change");
        self.state = state;
    }
}

impl std::fmt::Debug for Saga {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Saga")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_declaration_order() {
        let saga = Saga::new("ordered")
            .step(Step::without_compensation("first", || async { Ok(()) }))
            .step(Step::without_compensation("second", || async { Ok(()) }));

        assert_eq!(saga.len(), 2);
        assert_eq!(saga.step_at(0).name(), "first");
        assert_eq!(saga.step_at(1).name(), "second");
    }

    #[test]
    fn new_saga_starts_not_started() {
        let saga = Saga::new("fresh");
        assert!(saga.is_empty());
        assert_eq!(saga.state(), SagaState::NotStarted);
    }
}
