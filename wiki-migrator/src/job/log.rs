//! Job execution log
//!
//! Append-only log shared by the concurrent parts of one job run. Appends
//! are serialized by a mutex so insertion order is kept, and timestamps are
//! clamped to never go backwards. Every entry is mirrored to `tracing`.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::types::{LogEvent, LogLevel};
use crate::error::MigrationError;

struct LogState {
    events: Vec<LogEvent>,
    last_timestamp: Option<DateTime<Utc>>,
}

pub struct JobLog {
    job_id: String,
    state: Mutex<LogState>,
}

impl JobLog {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: Mutex::new(LogState {
                events: Vec::new(),
                last_timestamp: None,
            }),
        }
    }

    pub async fn debug(&self, message: impl Into<String>) {
        self.append(LogLevel::Debug, message.into(), None).await;
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.append(LogLevel::Info, message.into(), None).await;
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.append(LogLevel::Warn, message.into(), None).await;
    }

    /// Record an error together with its cause chain
    pub async fn error(&self, message: impl Into<String>, cause: &MigrationError) {
        let message = format!("{}: {}", message.into(), cause);
        self.append(LogLevel::Error, message, Some(cause.trace())).await;
    }

    async fn append(&self, level: LogLevel, message: String, trace: Option<Vec<String>>) {
        match level {
            LogLevel::Debug => debug!(job_id = %self.job_id, "{}", message),
            LogLevel::Info => info!(job_id = %self.job_id, "{}", message),
            LogLevel::Warn => warn!(job_id = %self.job_id, "{}", message),
            LogLevel::Error => error!(job_id = %self.job_id, "{}", message),
        }

        let mut state = self.state.lock().await;
        let now = Utc::now();
        let timestamp = match state.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        state.last_timestamp = Some(timestamp);
        state.events.push(LogEvent {
            level,
            timestamp,
            message,
            trace,
        });
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.events.len()
    }

    /// Consume the log, returning its events in insertion order
    pub fn freeze(self) -> Vec<LogEvent> {
        self.state.into_inner().events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    #[tokio::test]
    async fn test_events_keep_insertion_order() {
        let log = JobLog::new("job-1");
        log.info("first").await;
        log.warn("second").await;
        log.debug("third").await;

        let events = log.freeze();
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(events[1].level, LogLevel::Warn);
        assert!(events.iter().all(|e| e.trace.is_none()));
    }

    #[tokio::test]
    async fn test_error_carries_trace() {
        let log = JobLog::new("job-1");
        let cause = MigrationError::Conversion("bad table".to_string());
        log.error("Failed to migrate document ENG.Home", &cause).await;

        let events = log.freeze();
        assert_eq!(events[0].level, LogLevel::Error);
        assert_eq!(
            events[0].message,
            "Failed to migrate document ENG.Home: Conversion error: bad table"
        );
        assert!(!events[0].trace.as_ref().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let log = JobLog::new("job-1");
        join_all((0..50).map(|i| log.info(format!("event {}", i)))).await;
        assert_eq!(log.len().await, 50);

        let events = log.freeze();
        for pair in events.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}
