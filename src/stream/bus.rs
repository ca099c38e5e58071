//! Per-Run broadcast channel: the orchestrator publishes `StreamEvent`s, any
//! number of HTTP subscribers (including a late reconnect) can drain them.
//! A disconnected subscriber never cancels the underlying Run — the
//! orchestrator keeps driving the loop to completion regardless of whether
//! anyone is listening (spec §4.9 "cancellation via disconnect-does-not-cancel").

use tokio::sync::broadcast;

use super::events::StreamEvent;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct RunBus {
    sender: broadcast::Sender<StreamEvent>,
}

impl Default for RunBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RunBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; a `SendError` here just means there are currently
    /// no subscribers, which is not a failure worth surfacing.
    pub fn publish(&self, event: StreamEvent) {
        let _ = self.sender.send(event);
    }
}
