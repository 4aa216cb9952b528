//! Migration job execution
//!
//! A [`MigrationJob`] converts every document of the selected spaces, one
//! space per concurrent task (bounded), and finishes by freezing its status
//! into a [`JobSnapshot`] that is published on the [`EventBus`].
//!
//! Document-level failures are logged and skipped. Infrastructure failures
//! and cancellation abort the run with `FinishedFailure`.

use chrono::{DateTime, Utc};
use futures::stream::{self, TryStreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::log::JobLog;
use super::source::{ContentBlock, SpaceSource, TargetDocument, TargetStore};
use super::types::*;
use crate::error::{MigrationError, Result};
use crate::events::{EventBus, JobFinishedEvent};
use crate::macros::{ConversionOutcome, MacroConverterRegistry};

const DEFAULT_MAX_PARALLEL_SPACES: usize = 4;

/// One migration run
pub struct MigrationJob {
    id: String,
    request: MigrationRequest,
    state: JobState,
    answer: Option<SpaceAnswer>,
    registry: Arc<MacroConverterRegistry>,
    source: Arc<dyn SpaceSource>,
    target: Arc<dyn TargetStore>,
    max_parallel_spaces: usize,
    cancel: CancellationToken,
}

/// Per-document conversion counters
struct DocumentStats {
    rewritten: usize,
    unchanged: usize,
}

impl MigrationJob {
    pub fn new(
        request: MigrationRequest,
        registry: Arc<MacroConverterRegistry>,
        source: Arc<dyn SpaceSource>,
        target: Arc<dyn TargetStore>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            state: JobState::Created,
            answer: None,
            registry,
            source,
            target,
            max_parallel_spaces: DEFAULT_MAX_PARALLEL_SPACES,
            cancel: CancellationToken::new(),
        }
    }

    /// Limit the number of spaces migrated concurrently (at least 1)
    pub fn with_parallelism(mut self, max_parallel_spaces: usize) -> Self {
        self.max_parallel_spaces = max_parallel_spaces.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn request(&self) -> &MigrationRequest {
        &self.request
    }

    /// Token that cancels this job when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The space selection to resolve before the job starts
    pub fn question(&self) -> SpaceQuestion {
        SpaceQuestion::new(&self.request.spaces)
    }

    /// Set the resolved space selection. Only allowed once, before running,
    /// and it must map every selected space exactly once.
    pub fn answer_question(&mut self, answer: SpaceAnswer) -> Result<()> {
        if self.state != JobState::Created {
            return Err(MigrationError::InvalidState(format!(
                "cannot answer the space question of a {} job",
                self.state
            )));
        }
        if self.answer.is_some() {
            return Err(MigrationError::InvalidState(
                "space question already answered".to_string(),
            ));
        }
        self.question().validate(&answer)?;
        self.answer = Some(answer);
        Ok(())
    }

    pub fn answer(&self) -> Option<&SpaceAnswer> {
        self.answer.as_ref()
    }

    /// Run in a background task
    pub fn spawn(self, bus: EventBus) -> JoinHandle<Arc<JobSnapshot>> {
        tokio::spawn(async move { self.run(&bus).await })
    }

    /// Run to a terminal state, publish the finished signal once and return
    /// the frozen snapshot
    pub async fn run(mut self, bus: &EventBus) -> Arc<JobSnapshot> {
        let started_at = Utc::now();
        let log = JobLog::new(self.id.clone());
        let results = Mutex::new(Vec::new());

        let outcome = match self.state.transition(JobState::Running) {
            Ok(state) => {
                self.state = state;
                self.execute(&log, &results).await
            }
            Err(e) => Err(e),
        };

        let state = match outcome {
            Ok(()) => {
                log.info("Migration finished").await;
                JobState::FinishedSuccess
            }
            Err(e) => {
                let message = match &e {
                    MigrationError::Cancelled(_) => "Migration cancelled",
                    _ => "Migration aborted",
                };
                log.error(message, &e).await;
                JobState::FinishedFailure
            }
        };
        // Only Created -> Running can fail above; keep the terminal state either way
        self.state = self.state.transition(state).unwrap_or(state);

        let snapshot = Arc::new(self.freeze(started_at, log, results));
        let delivered = bus.publish(JobFinishedEvent {
            job_type: snapshot.job_type.clone(),
            job: snapshot.clone(),
        });
        info!(
            "Job {} finished as {} ({} listeners notified)",
            snapshot.id, snapshot.state, delivered
        );
        snapshot
    }

    async fn execute(&mut self, log: &JobLog, results: &Mutex<Vec<SpaceResult>>) -> Result<()> {
        self.check_cancelled()?;

        let answer = match self.answer.clone() {
            Some(answer) => answer,
            None => {
                let answer = self.question().default_answer(&self.request.target_root);
                self.answer = Some(answer.clone());
                answer
            }
        };

        log.info(format!(
            "Starting migration of {} spaces into {}",
            answer.entries.len(),
            self.request.target_root
        ))
        .await;

        let job: &MigrationJob = self;
        stream::iter(answer.entries.iter().map(Ok::<_, MigrationError>))
            .try_for_each_concurrent(job.max_parallel_spaces, |(space, target)| async move {
                job.migrate_space(space, target, log, results).await
            })
            .await
    }

    async fn migrate_space(
        &self,
        space: &SpaceSelection,
        target: &EntityReference,
        log: &JobLog,
        results: &Mutex<Vec<SpaceResult>>,
    ) -> Result<()> {
        self.check_cancelled()?;

        let document_ids = match self.source.list_documents(&space.key).await {
            Ok(ids) => ids,
            Err(e) if e.is_infrastructure() => return Err(e),
            Err(e) => {
                log.error(format!("Failed to read space {}", space.key), &e).await;
                return Ok(());
            }
        };

        let mut migrated = 0u64;
        let mut failed = 0u64;

        for document_id in &document_ids {
            self.check_cancelled()?;

            match self.migrate_document(space, target, document_id).await {
                Ok(stats) => {
                    migrated += 1;
                    log.debug(format!(
                        "Migrated document {}.{} ({} macros rewritten, {} kept)",
                        space.key, document_id, stats.rewritten, stats.unchanged
                    ))
                    .await;
                }
                Err(e) if e.is_infrastructure() => return Err(e),
                Err(e) => {
                    failed += 1;
                    log.error(
                        format!("Failed to migrate document {}.{}", space.key, document_id),
                        &e,
                    )
                    .await;
                }
            }
        }

        results.lock().await.push(SpaceResult {
            space: space.clone(),
            target: target.clone(),
            documents_migrated: migrated,
            documents_failed: failed,
        });

        log.info(format!(
            "Migrated space {} ({}) into {}: {} documents, {} failed",
            space.key, space.name, target, migrated, failed
        ))
        .await;

        Ok(())
    }

    async fn migrate_document(
        &self,
        space: &SpaceSelection,
        target: &EntityReference,
        document_id: &str,
    ) -> Result<DocumentStats> {
        let document = self.source.load_document(&space.key, document_id).await?;

        let mut stats = DocumentStats {
            rewritten: 0,
            unchanged: 0,
        };
        let mut content = String::new();

        for block in &document.content {
            match block {
                ContentBlock::Text(text) => content.push_str(text),
                ContentBlock::Macro(occurrence) => match self.registry.convert(occurrence)? {
                    ConversionOutcome::Rewritten(rewritten) => {
                        stats.rewritten += 1;
                        content.push_str(&rewritten.to_target_syntax());
                    }
                    ConversionOutcome::Unchanged => {
                        stats.unchanged += 1;
                        content.push_str(&occurrence.to_target_syntax());
                    }
                },
            }
        }

        self.target
            .save_document(TargetDocument {
                reference: target.child(&document.id),
                title: document.title.clone(),
                content,
                metadata: document.metadata(&space.key),
            })
            .await?;

        Ok(stats)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled(format!("job {}", self.id)));
        }
        Ok(())
    }

    fn freeze(
        self,
        started_at: DateTime<Utc>,
        log: JobLog,
        results: Mutex<Vec<SpaceResult>>,
    ) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            job_type: MIGRATION_JOB_TYPE.to_string(),
            request: self.request,
            answer: self.answer.unwrap_or_default(),
            state: self.state,
            results: results.into_inner(),
            log: log.freeze(),
            started_at,
            finished_at: Utc::now(),
        }
    }
}
