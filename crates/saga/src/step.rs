//! Saga steps: named forward/compensate action pairs.

use std::future::Future;
use std::pin::Pin;

use crate::error::StepError;

/// A boxed future produced by invoking an action.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>>;

/// A unit of work that either succeeds or fails with a reason. Actions have
/// no implicit retry; retry policy, if any, lives inside the action itself.
pub type Action = Box<dyn Fn() -> ActionFuture + Send + Sync>;

/// A single saga step.
///
/// The name is diagnostic only. Steps are immutable once added to a saga.
pub struct Step {
    name: String,
    forward: Action,
    compensate: Action,
}

impl Step {
    /// Creates a step from a forward closure and a compensating closure.
    ///
    /// Compensations are assumed idempotent: the coordinator invokes each at
    /// most once and never retries it.
    pub fn new<F, FFut, C, CFut>(name: impl Into<String>, forward: F, compensate: C) -> Self
    where
        F: Fn() -> FFut + Send + Sync + 'static,
        FFut: Future<Output = Result<(), StepError>> + Send + 'static,
        C: Fn() -> CFut + Send + Sync + 'static,
        CFut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            forward: Box::new(move || Box::pin(forward())),
            compensate: Box::new(move || Box::pin(compensate())),
        }
    }

    /// Creates a step whose compensation is a no-op.
    ///
    /// Useful for effects that cannot be undone, like a message already
    /// placed on a bus.
    pub fn without_compensation<F, FFut>(name: impl Into<String>, forward: F) -> Self
    where
        F: Fn() -> FFut + Send + Sync + 'static,
        FFut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        Self::new(name, forward, || async { Ok(()) })
    }

    /// Returns the step's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the forward action.
    pub(crate) fn forward(&self) -> ActionFuture {
        (self.forward)()
    }

    /// Invokes the compensating action.
    pub(crate) fn compensate(&self) -> ActionFuture {
        (self.compensate)()
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn forward_and_compensate_invoke_their_closures() {
        let forwards = Arc::new(AtomicUsize::new(0));
        let compensations = Arc::new(AtomicUsize::new(0));

        let f = forwards.clone();
        let c = compensations.clone();
        let step = Step::new(
            "count",
            move || {
                let f = f.clone();
                async move {
                    f.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        );

        step.forward().await.unwrap();
        step.forward().await.unwrap();
        step.compensate().await.unwrap();

        assert_eq!(forwards.load(Ordering::SeqCst), 2);
        assert_eq!(compensations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn without_compensation_is_a_noop() {
        let step = Step::without_compensation("publish", || async {
            Err(StepError::failed("transport down"))
        });

        assert!(step.forward().await.is_err());
        assert!(step.compensate().await.is_ok());
    }

    #[test]
    fn debug_shows_name_only() {
        let step = Step::without_compensation("claim", || async { Ok(()) });
        assert_eq!(format!("{step:?}"), "Step { name: \"claim\" }");
    }
}
