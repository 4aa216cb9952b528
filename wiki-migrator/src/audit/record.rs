//! Migration audit record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::job::{EntityReference, JobSnapshot, JobState};

/// How the audited job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Success,
    Failure,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Failure => "failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(JobOutcome::Success),
            "failure" => Some(JobOutcome::Failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable record of one migration run, stored in its audit document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationAuditRecord {
    /// Audit document holding this record
    pub document: EntityReference,
    /// Set once the finished job has been recorded
    pub executed: bool,
    pub job_id: Option<String>,
    pub outcome: Option<JobOutcome>,
    /// Target references of the migrated spaces
    pub migrated_spaces: Vec<EntityReference>,
    /// Serialized job log
    pub logs_json: String,
    pub executed_at: Option<DateTime<Utc>>,
}

impl MigrationAuditRecord {
    /// Unexecuted record waiting for its job
    pub fn new(document: EntityReference) -> Self {
        Self {
            document,
            executed: false,
            job_id: None,
            outcome: None,
            migrated_spaces: Vec::new(),
            logs_json: "[]".to_string(),
            executed_at: None,
        }
    }

    /// Fully populated executed record for a finished job
    pub fn from_snapshot(job: &JobSnapshot) -> Result<Self> {
        let outcome = match job.state {
            JobState::FinishedSuccess => JobOutcome::Success,
            _ => JobOutcome::Failure,
        };

        Ok(Self {
            document: job.request.audit_document.clone(),
            executed: true,
            job_id: Some(job.id.clone()),
            outcome: Some(outcome),
            migrated_spaces: job.migrated_spaces(),
            logs_json: job.logs_json()?,
            executed_at: Some(Utc::now()),
        })
    }

    /// Whether two records describe the same run, ignoring when they were
    /// written
    pub fn same_content(&self, other: &MigrationAuditRecord) -> bool {
        self.document == other.document
            && self.executed == other.executed
            && self.job_id == other.job_id
            && self.outcome == other.outcome
            && self.migrated_spaces == other.migrated_spaces
            && self.logs_json == other.logs_json
    }
}
