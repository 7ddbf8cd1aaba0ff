use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    BusError, Result,
    adapter::{Bus, ConfirmStatus, PublishHandle},
};

/// How the in-memory broker answers confirmation waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmMode {
    /// Acknowledge every publish immediately.
    #[default]
    Ack,

    /// Reject every publish (definite failure).
    Reject,

    /// Never answer; waits run into their timeout. Simulates a broker or
    /// network partition after the send.
    Withhold,
}

#[derive(Default)]
struct InMemoryBusState {
    queues: HashMap<String, Vec<Vec<u8>>>,
    confirms: HashMap<PublishHandle, ConfirmMode>,
    next_seq: u64,
    confirm_mode: ConfirmMode,
    fail_on_publish: bool,
}

/// In-memory bus for testing.
///
/// Publishes append to a per-destination queue; the confirmation behavior
/// is snapshotted per publish from the current [`ConfirmMode`], and can be
/// upgraded late with [`InMemoryBus::confirm`] to simulate a confirmation
/// that arrives after the caller gave up waiting.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    state: Arc<RwLock<InMemoryBusState>>,
}

impl InMemoryBus {
    /// Creates a new in-memory bus that acknowledges everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the confirmation behavior for subsequent publishes.
    pub fn set_confirm_mode(&self, mode: ConfirmMode) {
        self.state.write().unwrap().confirm_mode = mode;
    }

    /// Configures publish calls to fail with a transport error.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Delivers a late acknowledgment for an outstanding handle.
    pub fn confirm(&self, handle: PublishHandle) {
        if let Some(entry) = self.state.write().unwrap().confirms.get_mut(&handle) {
            *entry = ConfirmMode::Ack;
        }
    }

    /// Returns the payloads published to a destination, in publish order.
    pub fn published(&self, destination: &str) -> Vec<Vec<u8>> {
        self.state
            .read()
            .unwrap()
            .queues
            .get(destination)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of payloads published to a destination.
    pub fn publish_count(&self, destination: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .queues
            .get(destination)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl Bus for InMemoryBus {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<PublishHandle> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_publish {
            return Err(BusError::Transport("simulated connect failure".to_string()));
        }

        state.next_seq += 1;
        let handle = PublishHandle::new(state.next_seq);
        let mode = state.confirm_mode;

        state
            .queues
            .entry(destination.to_string())
            .or_default()
            .push(payload.to_vec());
        state.confirms.insert(handle, mode);

        Ok(handle)
    }

    async fn await_confirmation(
        &self,
        handle: PublishHandle,
        timeout: Duration,
    ) -> Result<ConfirmStatus> {
        let mode = {
            let state = self.state.read().unwrap();
            *state
                .confirms
                .get(&handle)
                .ok_or(BusError::UnknownHandle(handle))?
        };

        match mode {
            ConfirmMode::Ack => Ok(ConfirmStatus::Acknowledged),
            ConfirmMode::Reject => Ok(ConfirmStatus::Rejected),
            ConfirmMode::Withhold => {
                tokio::time::sleep(timeout).await;
                // A confirmation may have been delivered while we waited.
                let state = self.state.read().unwrap();
                match state.confirms.get(&handle) {
                    Some(ConfirmMode::Ack) => Ok(ConfirmStatus::Acknowledged),
                    Some(_) => Ok(ConfirmStatus::TimedOut),
                    None => Err(BusError::ChannelClosed),
                }
            }
        }
    }
}
