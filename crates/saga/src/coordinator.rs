//! Saga coordinator: plays steps forward and compensates on failure.

use crate::error::StepError;
use crate::executor::StepExecutor;
use crate::saga::Saga;
use crate::state::SagaState;

/// Outcome of playing a saga to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaOutcome {
    /// Every forward action succeeded.
    Success,

    /// A forward action failed and every prior step was compensated, in
    /// reverse order of forward completion.
    Compensated {
        /// The step whose forward action failed.
        failed_step: String,
        /// Why it failed.
        cause: String,
    },

    /// A forward action failed *and* one of the compensations failed too,
    /// leaving the saga's side effects in a known-divergent state. This is
    /// fatal for the unit of work and must reach an operator.
    CompensationFailed {
        /// The step whose forward action failed.
        failed_step: String,
        /// Why it failed.
        cause: String,
        /// The step whose compensation failed.
        compensation_step: String,
        /// Why the compensation failed.
        compensation_cause: String,
    },

    /// A forward action's effect could not be confirmed either way. No
    /// compensation was run: undoing earlier steps could contradict an
    /// effect that actually landed.
    Indeterminate {
        /// The step with the unresolved outcome.
        step: String,
        /// Why the outcome is unresolved.
        cause: String,
    },
}

impl SagaOutcome {
    /// Returns the terminal saga state this outcome corresponds to.
    pub fn final_state(&self) -> SagaState {
        match self {
            SagaOutcome::Success => SagaState::Completed,
            SagaOutcome::Compensated { .. } => SagaState::Compensated,
            SagaOutcome::CompensationFailed { .. } => SagaState::Failed,
            SagaOutcome::Indeterminate { .. } => SagaState::Indeterminate,
        }
    }
}

/// Executes sagas with an all-or-compensated guarantee per instance.
///
/// The coordinator holds no cross-saga state; a single instance can play
/// any number of sagas, concurrently or in sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct SagaCoordinator {
    executor: StepExecutor,
}

impl SagaCoordinator {
    /// Creates a new coordinator.
    pub fn new() -> Self {
        Self {
            executor: StepExecutor::new(),
        }
    }

    /// Plays the saga's steps in declared order.
    ///
    /// On a step's definite failure, the compensations of all steps
    /// completed so far run in strict reverse order (LIFO). The failing
    /// step's own compensation is never invoked, nor are compensations of
    /// steps that were never attempted. No step is retried.
    ///
    /// Compensation stops at the first compensation failure and reports
    /// [`SagaOutcome::CompensationFailed`] immediately.
    #[tracing::instrument(skip(self, saga), fields(saga = %saga.name()))]
    pub async fn play(&self, mut saga: Saga) -> SagaOutcome {
        metrics::counter!("saga_plays_total").increment(1);
        let started = std::time::Instant::now();

        saga.set_state(SagaState::Running);

        let mut completed: Vec<usize> = Vec::with_capacity(saga.len());
        let mut outcome = SagaOutcome::Success;

        for index in 0..saga.len() {
            match self.executor.execute(saga.step_at(index)).await {
                Ok(()) => {
                    completed.push(index);
                }
                Err(StepError::Indeterminate(cause)) => {
                    outcome = SagaOutcome::Indeterminate {
                        step: saga.step_at(index).name().to_string(),
                        cause,
                    };
                    break;
                }
                Err(StepError::Failed(cause)) => {
                    let failed_step = saga.step_at(index).name().to_string();
                    tracing::warn!(step = %failed_step, %cause, "step failed, compensating");
                    outcome = self
                        .compensate(&mut saga, &completed, failed_step, cause)
                        .await;
                    break;
                }
            }
        }

        saga.set_state(outcome.final_state());
        metrics::histogram!("saga_play_duration_seconds").record(started.elapsed().as_secs_f64());
        outcome
    }

    /// Runs compensations for completed steps in reverse order.
    async fn compensate(
        &self,
        saga: &mut Saga,
        completed: &[usize],
        failed_step: String,
        cause: String,
    ) -> SagaOutcome {
        saga.set_state(SagaState::Compensating);

        for &index in completed.iter().rev() {
            if let Err(comp_err) = self
                .executor
                .execute_compensation(saga.step_at(index))
                .await
            {
                return SagaOutcome::CompensationFailed {
                    failed_step,
                    cause,
                    compensation_step: saga.step_at(index).name().to_string(),
                    compensation_cause: comp_err.cause().to_string(),
                };
            }
        }

        SagaOutcome::Compensated { failed_step, cause }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;
    use std::sync::{Arc, Mutex};

    /// What a scripted step's forward action should do.
    #[derive(Clone, Copy)]
    enum Forward {
        Succeed,
        Fail,
        Hang, // indeterminate
    }

    type Log = Arc<Mutex<Vec<String>>>;

    /// Builds a step that records its invocations into `log`.
    fn scripted(name: &str, forward: Forward, compensation_fails: bool, log: &Log) -> Step {
        let fwd_log = log.clone();
        let comp_log = log.clone();
        let fwd_name = name.to_string();
        let comp_name = name.to_string();

        Step::new(
            name,
            move || {
                let log = fwd_log.clone();
                let name = fwd_name.clone();
                async move {
                    log.lock().unwrap().push(format!("{name}:forward"));
                    match forward {
                        Forward::Succeed => Ok(()),
                        Forward::Fail => Err(StepError::failed("scripted failure")),
                        Forward::Hang => Err(StepError::indeterminate("scripted timeout")),
                    }
                }
            },
            move || {
                let log = comp_log.clone();
                let name = comp_name.clone();
                async move {
                    log.lock().unwrap().push(format!("{name}:compensate"));
                    if compensation_fails {
                        Err(StepError::failed("scripted compensation failure"))
                    } else {
                        Ok(())
                    }
                }
            },
        )
    }

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn happy_path_runs_no_compensations() {
        let log = new_log();
        let saga = Saga::new("happy")
            .step(scripted("a", Forward::Succeed, false, &log))
            .step(scripted("b", Forward::Succeed, false, &log))
            .step(scripted("c", Forward::Succeed, false, &log));

        let outcome = SagaCoordinator::new().play(saga).await;

        assert_eq!(outcome, SagaOutcome::Success);
        assert_eq!(entries(&log), vec!["a:forward", "b:forward", "c:forward"]);
    }

    #[tokio::test]
    async fn failure_compensates_completed_steps_in_reverse() {
        let log = new_log();
        let saga = Saga::new("mid-failure")
            .step(scripted("a", Forward::Succeed, false, &log))
            .step(scripted("b", Forward::Succeed, false, &log))
            .step(scripted("c", Forward::Fail, false, &log));

        let outcome = SagaCoordinator::new().play(saga).await;

        assert_eq!(
            outcome,
            SagaOutcome::Compensated {
                failed_step: "c".to_string(),
                cause: "scripted failure".to_string(),
            }
        );
        // Exactly steps 0..k-1 compensated, in strict reverse order;
        // the failing step's own compensation never runs.
        assert_eq!(
            entries(&log),
            vec![
                "a:forward",
                "b:forward",
                "c:forward",
                "b:compensate",
                "a:compensate"
            ]
        );
    }

    #[tokio::test]
    async fn first_step_failure_compensates_nothing() {
        let log = new_log();
        let saga = Saga::new("early-failure")
            .step(scripted("a", Forward::Fail, false, &log))
            .step(scripted("b", Forward::Succeed, false, &log));

        let outcome = SagaCoordinator::new().play(saga).await;

        assert!(matches!(outcome, SagaOutcome::Compensated { failed_step, .. } if failed_step == "a"));
        // Step b was never attempted
        assert_eq!(entries(&log), vec!["a:forward"]);
    }

    #[tokio::test]
    async fn compensation_failure_stops_immediately() {
        let log = new_log();
        let saga = Saga::new("divergent")
            .step(scripted("a", Forward::Succeed, false, &log))
            .step(scripted("b", Forward::Succeed, true, &log))
            .step(scripted("c", Forward::Fail, false, &log));

        let outcome = SagaCoordinator::new().play(saga).await;

        assert_eq!(
            outcome,
            SagaOutcome::CompensationFailed {
                failed_step: "c".to_string(),
                cause: "scripted failure".to_string(),
                compensation_step: "b".to_string(),
                compensation_cause: "scripted compensation failure".to_string(),
            }
        );
        // a's compensation is never reached once b's compensation fails
        assert_eq!(
            entries(&log),
            vec!["a:forward", "b:forward", "c:forward", "b:compensate"]
        );
    }

    #[tokio::test]
    async fn indeterminate_step_skips_all_compensation() {
        let log = new_log();
        let saga = Saga::new("unresolved")
            .step(scripted("a", Forward::Succeed, false, &log))
            .step(scripted("b", Forward::Hang, false, &log))
            .step(scripted("c", Forward::Succeed, false, &log));

        let outcome = SagaCoordinator::new().play(saga).await;

        assert_eq!(
            outcome,
            SagaOutcome::Indeterminate {
                step: "b".to_string(),
                cause: "scripted timeout".to_string(),
            }
        );
        // No compensations, and no later forwards either
        assert_eq!(entries(&log), vec!["a:forward", "b:forward"]);
    }

    #[tokio::test]
    async fn empty_saga_succeeds() {
        let outcome = SagaCoordinator::new().play(Saga::new("empty")).await;
        assert_eq!(outcome, SagaOutcome::Success);
    }

    #[test]
    fn outcome_maps_to_terminal_state() {
        assert_eq!(SagaOutcome::Success.final_state(), SagaState::Completed);
        assert_eq!(
            SagaOutcome::Compensated {
                failed_step: "x".into(),
                cause: "y".into()
            }
            .final_state(),
            SagaState::Compensated
        );
        assert_eq!(
            SagaOutcome::CompensationFailed {
                failed_step: "x".into(),
                cause: "y".into(),
                compensation_step: "z".into(),
                compensation_cause: "w".into()
            }
            .final_state(),
            SagaState::Failed
        );
        assert_eq!(
            SagaOutcome::Indeterminate {
                step: "x".into(),
                cause: "y".into()
            }
            .final_state(),
            SagaState::Indeterminate
        );
    }
}
