//! Step executor: runs a single step action and reports the result.

use crate::error::StepError;
use crate::step::Step;

/// Runs individual step actions. The executor has no knowledge of sagas;
/// the coordinator decides what to run and in which order.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepExecutor;

impl StepExecutor {
    /// Creates a new step executor.
    pub fn new() -> Self {
        Self
    }

    /// Runs a step's forward action.
    #[tracing::instrument(skip(self, step), fields(step = step.name()))]
    pub async fn execute(&self, step: &Step) -> Result<(), StepError> {
        let result = step.forward().await;
        match &result {
            Ok(()) => {
                metrics::counter!("saga_steps_total").increment(1);
                tracing::debug!("step forward succeeded");
            }
            Err(StepError::Failed(cause)) => {
                metrics::counter!("saga_step_failures_total").increment(1);
                tracing::warn!(%cause, "step forward failed");
            }
            Err(StepError::Indeterminate(cause)) => {
                metrics::counter!("saga_step_indeterminate_total").increment(1);
                tracing::warn!(%cause, "step forward indeterminate");
            }
        }
        result
    }

    /// Runs a step's compensating action.
    ///
    /// Compensations are invoked at most once and never retried here; an
    /// indeterminate result from a compensation is treated as a failure,
    /// because the coordinator cannot verify it either way.
    #[tracing::instrument(skip(self, step), fields(step = step.name()))]
    pub async fn execute_compensation(&self, step: &Step) -> Result<(), StepError> {
        let result = step.compensate().await;
        match &result {
            Ok(()) => {
                metrics::counter!("saga_compensations_total").increment(1);
                tracing::debug!("compensation succeeded");
            }
            Err(e) => {
                metrics::counter!("saga_compensation_failures_total").increment(1);
                tracing::error!(cause = %e.cause(), "compensation failed");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_reports_forward_result() {
        let executor = StepExecutor::new();

        let ok = Step::without_compensation("ok", || async { Ok(()) });
        assert!(executor.execute(&ok).await.is_ok());

        let failing =
            Step::without_compensation("bad", || async { Err(StepError::failed("boom")) });
        assert_eq!(
            executor.execute(&failing).await,
            Err(StepError::failed("boom"))
        );
    }

    #[tokio::test]
    async fn execute_compensation_reports_compensate_result() {
        let executor = StepExecutor::new();

        let step = Step::new(
            "rollback",
            || async { Ok(()) },
            || async { Err(StepError::failed("rollback refused")) },
        );
        assert!(executor.execute_compensation(&step).await.is_err());
    }
}
