//! Worker pool: repeated scan passes with graceful shutdown.

use std::sync::Arc;

use bus::Bus;
use ledger::Ledger;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::driver::OutboxDriver;

/// Handle to a running set of relay workers.
pub struct RelayHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayHandle {
    /// Signals all workers to stop and waits for them to finish their
    /// current pass.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

impl<L, B> OutboxDriver<L, B>
where
    L: Ledger + 'static,
    B: Bus + 'static,
{
    /// Spawns the configured number of worker tasks, each looping over scan
    /// passes.
    ///
    /// Workers share this driver and scan the same statuses; the ledger's
    /// `Pending → Publishing` CAS guarantees each record is owned by at most
    /// one of them. A pass failure (e.g. the ledger is briefly unreachable)
    /// is logged and retried on the next pass.
    pub fn spawn(self: &Arc<Self>) -> RelayHandle {
        let (shutdown, rx) = watch::channel(false);

        let tasks = (0..self.config().workers.max(1))
            .map(|worker| {
                let driver = self.clone();
                let mut rx = rx.clone();
                tokio::spawn(async move {
                    tracing::info!(worker, "relay worker started");
                    loop {
                        match driver.run_pass().await {
                            Ok(summary) => {
                                tracing::debug!(worker, ?summary, "scan pass finished");
                            }
                            Err(e) => {
                                tracing::warn!(worker, cause = %e, "scan pass failed");
                            }
                        }

                        tokio::select! {
                            _ = tokio::time::sleep(driver.config().scan_interval) => {}
                            _ = rx.changed() => break,
                        }
                    }
                    tracing::info!(worker, "relay worker stopped");
                })
            })
            .collect();

        RelayHandle { shutdown, tasks }
    }
}
