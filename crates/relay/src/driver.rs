//! Outbox driver: turns pending ledger records into publish sagas.

use std::sync::Arc;
use std::time::Duration;

use bus::{Bus, BusError, ConfirmStatus};
use ledger::{Ledger, LedgerExt, OutboxRecord, RecordId, RecordStatus};
use saga::{Saga, SagaCoordinator, SagaOutcome, Step, StepError};

use crate::backoff::BackoffTracker;
use crate::config::RelayConfig;
use crate::error::Result;

/// Step name: claim the record via the `Pending → Publishing` CAS.
const STEP_CLAIM: &str = "claim";
/// Step name: publish the payload and await confirmation.
const STEP_PUBLISH: &str = "publish";

/// Claim-step failure cause when another worker won the CAS. Losing the
/// race is benign and must not count as a retry.
const CLAIM_LOST: &str = "claim lost to another worker";

/// What happened to one record during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Published,
    Retried,
    Failed,
    Indeterminate,
    Skipped,
}

/// Counters for a single scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    /// Pending records seen by the scan.
    pub scanned: usize,
    /// Records confirmed and finalized to `Published`.
    pub published: usize,
    /// Records returned to `Pending` for a later retry.
    pub retried: usize,
    /// Records marked `Failed` for operator intervention.
    pub failed: usize,
    /// Records left in `Publishing` with an unresolved delivery.
    pub indeterminate: usize,
    /// Records skipped (backoff window, or claim lost to another worker).
    pub skipped: usize,
    /// Stuck `Publishing` records examined by the reconcile phase.
    pub reconciled: usize,
}

/// Drives pending outbox records through claim → publish → finalize.
///
/// One driver may be shared by several worker tasks; all cross-worker
/// mutual exclusion goes through the ledger's CAS.
pub struct OutboxDriver<L, B> {
    ledger: Arc<L>,
    bus: Arc<B>,
    config: RelayConfig,
    coordinator: SagaCoordinator,
    backoff: BackoffTracker,
}

impl<L, B> OutboxDriver<L, B>
where
    L: Ledger + 'static,
    B: Bus + 'static,
{
    /// Creates a new driver.
    pub fn new(ledger: Arc<L>, bus: Arc<B>, config: RelayConfig) -> Self {
        let backoff = BackoffTracker::new(config.retry.clone());
        Self {
            ledger,
            bus,
            config,
            coordinator: SagaCoordinator::new(),
            backoff,
        }
    }

    /// Returns the driver's configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Runs one scan pass: process eligible `Pending` records, then
    /// reconcile stuck `Publishing` ones.
    ///
    /// Per-record failures are absorbed into the summary; only a failure of
    /// the scan itself aborts the pass.
    #[tracing::instrument(skip(self))]
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();

        let pending = self
            .ledger
            .records_with_status(RecordStatus::Pending)
            .await?;

        for record in pending {
            summary.scanned += 1;

            if !self.backoff.is_eligible(record.id) {
                summary.skipped += 1;
                continue;
            }

            match self.process_record(&record).await {
                Disposition::Published => summary.published += 1,
                Disposition::Retried => summary.retried += 1,
                Disposition::Failed => summary.failed += 1,
                Disposition::Indeterminate => summary.indeterminate += 1,
                Disposition::Skipped => summary.skipped += 1,
            }
        }

        self.reconcile_publishing(&mut summary).await?;

        Ok(summary)
    }

    /// Builds the two-step saga for one record.
    ///
    /// Step 1 claims the record (`Pending → Publishing`) and rolls the claim
    /// back on compensation. Step 2 publishes and awaits confirmation; its
    /// compensation is a no-op, because a message already handed to the bus
    /// cannot be un-sent; the ledger-side compensation is what protects
    /// correctness.
    fn build_saga(&self, record: &OutboxRecord) -> Saga {
        let id = record.id;

        let claim_ledger = self.ledger.clone();
        let rollback_ledger = self.ledger.clone();
        let claim = Step::new(
            STEP_CLAIM,
            move || {
                let ledger = claim_ledger.clone();
                async move {
                    match ledger
                        .try_transition(id, RecordStatus::Pending, RecordStatus::Publishing)
                        .await
                    {
                        Ok(true) => Ok(()),
                        Ok(false) => Err(StepError::failed(CLAIM_LOST)),
                        Err(e) => Err(StepError::failed(format!("ledger error: {e}"))),
                    }
                }
            },
            move || {
                let ledger = rollback_ledger.clone();
                async move {
                    match ledger
                        .try_transition(id, RecordStatus::Publishing, RecordStatus::Pending)
                        .await
                    {
                        Ok(true) => Ok(()),
                        Ok(false) => Err(StepError::failed(
                            "record left publishing state under our claim",
                        )),
                        Err(e) => Err(StepError::failed(format!("ledger error: {e}"))),
                    }
                }
            },
        );

        let bus = self.bus.clone();
        let destination = self.config.destination.clone();
        let payload = record.payload.clone();
        let timeout = self.config.confirm_timeout;
        let publish = Step::without_compensation(STEP_PUBLISH, move || {
            let bus = bus.clone();
            let destination = destination.clone();
            let payload = payload.clone();
            async move {
                match publish_with_confirm(bus.as_ref(), &destination, &payload, timeout).await {
                    Ok(ConfirmStatus::Acknowledged) => Ok(()),
                    Ok(ConfirmStatus::Rejected) => {
                        Err(StepError::failed("broker rejected delivery"))
                    }
                    Ok(ConfirmStatus::TimedOut) => {
                        Err(StepError::indeterminate("confirmation timed out"))
                    }
                    Err(BusError::Transport(cause)) => {
                        Err(StepError::failed(format!("publish failed: {cause}")))
                    }
                    // The publish went out; only the confirmation is gone.
                    Err(e) => Err(StepError::indeterminate(format!(
                        "confirmation wait failed: {e}"
                    ))),
                }
            }
        });

        Saga::new(format!("outbox-{id}")).step(claim).step(publish)
    }

    /// Plays one record's saga and applies the outcome to the ledger.
    async fn process_record(&self, record: &OutboxRecord) -> Disposition {
        let id = record.id;
        let outcome = self.coordinator.play(self.build_saga(record)).await;

        match outcome {
            SagaOutcome::Success => self.finalize_published(id).await,

            SagaOutcome::Compensated { failed_step, cause }
                if failed_step == STEP_CLAIM && cause == CLAIM_LOST =>
            {
                tracing::debug!(record_id = %id, "record claimed by another worker");
                Disposition::Skipped
            }

            SagaOutcome::Compensated { failed_step, cause } => {
                let delay = self.backoff.note_failure(id);
                metrics::counter!("relay_retried_total").increment(1);
                tracing::info!(
                    record_id = %id,
                    from_status = %RecordStatus::Publishing,
                    to_status = %RecordStatus::Pending,
                    step = %failed_step,
                    %cause,
                    retry_in = ?delay,
                    "record returned to pending"
                );
                Disposition::Retried
            }

            SagaOutcome::CompensationFailed {
                failed_step,
                cause,
                compensation_step,
                compensation_cause,
            } => {
                self.mark_failed(id, &failed_step, &cause, &compensation_step, &compensation_cause)
                    .await;
                Disposition::Failed
            }

            SagaOutcome::Indeterminate { step, cause } => {
                let delay = self.backoff.note_failure(id);
                metrics::counter!("relay_indeterminate_total").increment(1);
                tracing::warn!(
                    record_id = %id,
                    status = %RecordStatus::Publishing,
                    %step,
                    %cause,
                    recheck_in = ?delay,
                    "delivery unresolved, leaving record in publishing"
                );
                Disposition::Indeterminate
            }
        }
    }

    /// Finalizes a confirmed record: `Publishing → Published`.
    async fn finalize_published(&self, id: RecordId) -> Disposition {
        match self
            .ledger
            .try_transition(id, RecordStatus::Publishing, RecordStatus::Published)
            .await
        {
            Ok(true) => {
                self.backoff.clear(id);
                metrics::counter!("relay_published_total").increment(1);
                tracing::info!(
                    record_id = %id,
                    from_status = %RecordStatus::Publishing,
                    to_status = %RecordStatus::Published,
                    "record published"
                );
                Disposition::Published
            }
            Ok(false) => {
                // Concurrent modification: leave the record where it is and
                // let the reconcile phase re-check actual delivery state.
                tracing::warn!(
                    record_id = %id,
                    "final transition lost, record left in publishing"
                );
                Disposition::Indeterminate
            }
            Err(e) => {
                self.backoff.note_failure(id);
                tracing::warn!(
                    record_id = %id,
                    cause = %e,
                    "final transition failed, record left in publishing"
                );
                Disposition::Indeterminate
            }
        }
    }

    /// Marks a record `Failed` after a compensation failure. This is the one
    /// condition where the ledger and the bus can provably diverge, so it is
    /// surfaced loudly for operator intervention.
    async fn mark_failed(
        &self,
        id: RecordId,
        failed_step: &str,
        cause: &str,
        compensation_step: &str,
        compensation_cause: &str,
    ) {
        self.backoff.clear(id);
        metrics::counter!("relay_failed_total").increment(1);
        tracing::error!(
            record_id = %id,
            from_status = %RecordStatus::Publishing,
            to_status = %RecordStatus::Failed,
            step = %failed_step,
            %cause,
            %compensation_step,
            %compensation_cause,
            "compensation failed, record requires manual reconciliation"
        );

        match self
            .ledger
            .try_transition(id, RecordStatus::Publishing, RecordStatus::Failed)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(record_id = %id, "could not mark record failed: status moved");
            }
            Err(e) => {
                tracing::error!(record_id = %id, cause = %e, "could not mark record failed");
            }
        }
    }

    /// Re-checks records stuck in `Publishing` whose last transition is
    /// older than `stale_after`.
    ///
    /// The re-publish is dedup-safe: delivery is at-least-once and the
    /// consumer side de-duplicates, so publishing again is always safe. A
    /// record leaves `Publishing` only through a confirmed delivery; it is
    /// never returned to `Pending`, because the earlier publish may have
    /// landed.
    async fn reconcile_publishing(&self, summary: &mut PassSummary) -> Result<()> {
        // An unrepresentable stale_after means no record is old enough.
        let stale_cutoff = chrono::Duration::from_std(self.config.stale_after)
            .ok()
            .and_then(|age| chrono::Utc::now().checked_sub_signed(age))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        let publishing = self
            .ledger
            .records_with_status(RecordStatus::Publishing)
            .await?;

        for record in publishing {
            if record.updated_at > stale_cutoff {
                continue;
            }
            if !self.backoff.is_eligible(record.id) {
                continue;
            }
            summary.reconciled += 1;

            match publish_with_confirm(
                self.bus.as_ref(),
                &self.config.destination,
                &record.payload,
                self.config.confirm_timeout,
            )
            .await
            {
                Ok(status) if status.is_acknowledged() => {
                    if self.finalize_published(record.id).await == Disposition::Published {
                        summary.published += 1;
                    } else {
                        summary.indeterminate += 1;
                    }
                }
                Ok(status) => {
                    let delay = self.backoff.note_failure(record.id);
                    summary.indeterminate += 1;
                    tracing::warn!(
                        record_id = %record.id,
                        confirm = ?status,
                        recheck_in = ?delay,
                        "reconcile publish unconfirmed, record stays in publishing"
                    );
                }
                Err(e) => {
                    let delay = self.backoff.note_failure(record.id);
                    summary.indeterminate += 1;
                    tracing::warn!(
                        record_id = %record.id,
                        cause = %e,
                        recheck_in = ?delay,
                        "reconcile publish failed, record stays in publishing"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Publishes a payload and bounds the confirmation wait.
///
/// A timeout abandons only the wait; the already-issued publish is never
/// cancelled.
async fn publish_with_confirm<B: Bus + ?Sized>(
    bus: &B,
    destination: &str,
    payload: &[u8],
    timeout: Duration,
) -> std::result::Result<ConfirmStatus, BusError> {
    let handle = bus.publish(destination, payload).await?;
    bus.await_confirmation(handle, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::InMemoryBus;
    use ledger::InMemoryLedger;

    fn test_driver(
        ledger: &Arc<InMemoryLedger>,
        bus: &Arc<InMemoryBus>,
    ) -> OutboxDriver<InMemoryLedger, InMemoryBus> {
        let config = RelayConfig {
            stale_after: Duration::ZERO,
            ..RelayConfig::default()
        };
        OutboxDriver::new(ledger.clone(), bus.clone(), config)
    }

    #[tokio::test]
    async fn pass_over_empty_ledger_is_a_noop() {
        let ledger = Arc::new(InMemoryLedger::new());
        let bus = Arc::new(InMemoryBus::new());
        let driver = test_driver(&ledger, &bus);

        let summary = driver.run_pass().await.unwrap();
        assert_eq!(summary, PassSummary::default());
    }

    #[tokio::test]
    async fn claim_race_is_reported_as_skip() {
        let ledger = Arc::new(InMemoryLedger::new());
        let bus = Arc::new(InMemoryBus::new());
        let driver = test_driver(&ledger, &bus);

        let id = ledger.insert_pending(b"contested".to_vec()).await;
        let record = ledger.get(id).await.unwrap().unwrap();

        // Another worker wins the claim between scan and play
        ledger
            .try_transition(id, RecordStatus::Pending, RecordStatus::Publishing)
            .await
            .unwrap();

        let disposition = driver.process_record(&record).await;
        assert_eq!(disposition, Disposition::Skipped);
        // The loser must not have published
        assert_eq!(bus.publish_count("messages"), 0);
    }

    #[tokio::test]
    async fn successful_record_is_finalized() {
        let ledger = Arc::new(InMemoryLedger::new());
        let bus = Arc::new(InMemoryBus::new());
        let driver = test_driver(&ledger, &bus);

        let id = ledger.insert_pending(b"hello".to_vec()).await;
        let record = ledger.get(id).await.unwrap().unwrap();

        let disposition = driver.process_record(&record).await;
        assert_eq!(disposition, Disposition::Published);
        assert_eq!(
            ledger.status_of(id).await.unwrap(),
            Some(RecordStatus::Published)
        );
        assert_eq!(bus.published("messages"), vec![b"hello".to_vec()]);
    }
}
