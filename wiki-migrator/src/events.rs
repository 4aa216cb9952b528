//! Job finished signals
//!
//! Jobs publish a [`JobFinishedEvent`] on the [`EventBus`] once they reach a
//! terminal state. Delivery is asynchronous and may repeat, so subscribers
//! must tolerate seeing the same job twice.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::job::JobSnapshot;

/// Default number of undelivered events kept per subscriber
const DEFAULT_CAPACITY: usize = 64;

/// Signal emitted by a job that reached a terminal state
#[derive(Debug, Clone)]
pub struct JobFinishedEvent {
    pub job_type: String,
    pub job: Arc<JobSnapshot>,
}

/// Typed broadcast bus for job finished signals
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<JobFinishedEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobFinishedEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning the number of subscribers reached
    pub fn publish(&self, event: JobFinishedEvent) -> usize {
        debug!("Publishing finished signal for job {}", event.job.id);
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
