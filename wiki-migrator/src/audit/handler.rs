//! Job completion handler
//!
//! Turns the frozen snapshot of a finished migration job into its durable
//! audit record. Finished signals may be delivered more than once: a repeat
//! carrying the same content is a no-op, a repeat that would change an
//! executed record is rejected.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::record::MigrationAuditRecord;
use super::store::AuditStore;
use crate::error::{MigrationError, Result};
use crate::events::{EventBus, JobFinishedEvent};
use crate::job::MIGRATION_JOB_TYPE;

/// What handling a finished signal did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Audit record written
    Recorded,
    /// Same run was already recorded; nothing written
    AlreadyRecorded,
    /// Signal of another job type
    Ignored,
}

pub struct JobCompletionHandler {
    store: Arc<dyn AuditStore>,
}

impl JobCompletionHandler {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Record one finished signal
    pub async fn handle(&self, event: &JobFinishedEvent) -> Result<HandleOutcome> {
        if event.job_type != MIGRATION_JOB_TYPE {
            debug!("Ignoring finished signal for job type {}", event.job_type);
            return Ok(HandleOutcome::Ignored);
        }

        let job = &event.job;
        if !job.state.is_terminal() {
            return Err(MigrationError::InvalidState(format!(
                "job {} finished signal carries non-terminal state {}",
                job.id, job.state
            )));
        }

        let document = &job.request.audit_document;
        let existing = self
            .store
            .load_record(document)
            .await
            .map_err(|e| {
                MigrationError::Persistence(format!("failed to load audit record {}: {}", document, e))
            })?
            .ok_or_else(|| MigrationError::NotFound(format!("audit document {}", document)))?;

        let record = MigrationAuditRecord::from_snapshot(job)?;

        if existing.executed {
            return Self::check_duplicate(&existing, &record);
        }

        let written = self.store.save_executed(&record).await.map_err(|e| {
            MigrationError::Persistence(format!("failed to save audit record {}: {}", document, e))
        })?;

        if written {
            info!(
                "Recorded migration job {} in {} ({}, {} spaces)",
                job.id,
                document,
                job.state,
                record.migrated_spaces.len()
            );
            return Ok(HandleOutcome::Recorded);
        }

        // Another delivery won the write between load and save
        match self.store.load_record(document).await? {
            Some(current) => Self::check_duplicate(&current, &record),
            None => Err(MigrationError::NotFound(format!("audit document {}", document))),
        }
    }

    fn check_duplicate(
        existing: &MigrationAuditRecord,
        record: &MigrationAuditRecord,
    ) -> Result<HandleOutcome> {
        if existing.same_content(record) {
            debug!("Audit record {} already holds job {:?}", record.document, record.job_id);
            Ok(HandleOutcome::AlreadyRecorded)
        } else {
            Err(MigrationError::AlreadyExecuted(format!(
                "{} was executed by job {}",
                record.document,
                existing.job_id.as_deref().unwrap_or("<unknown>")
            )))
        }
    }

    /// Consume finished signals from the bus until it closes, returning the
    /// signals that could not be recorded.
    ///
    /// The subscription is taken before this returns, so no signal published
    /// afterwards is missed.
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<Vec<MigrationError>> {
        let mut receiver = bus.subscribe();

        tokio::spawn(async move {
            let mut failures = Vec::new();
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.handle(&event).await {
                            error!("Failed to record migration job {}: {}", event.job.id, e);
                            failures.push(e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Completion handler missed {} finished signals", skipped);
                        failures.push(MigrationError::Persistence(format!(
                            "{} finished signals were dropped before recording",
                            skipped
                        )));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Completion handler stopped with {} failures", failures.len());
            failures
        })
    }
}
