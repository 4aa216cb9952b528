//! Migration job types and data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{MigrationError, Result};

/// Job type carried by every finished signal of a migration job
pub const MIGRATION_JOB_TYPE: &str = "wiki.migration";

/// Reference to an entity of the target wiki, e.g. `Migrated.Engineering`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityReference(String);

impl EntityReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Reference to a child entity. Dots in the child name are escaped.
    pub fn child(&self, name: &str) -> EntityReference {
        EntityReference(format!("{}.{}", self.0, name.replace('.', "\\.")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A source space chosen for migration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceSelection {
    /// Stable space key
    pub key: String,
    /// Display name
    pub name: String,
}

impl SpaceSelection {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }
}

/// Migration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRequest {
    /// Document holding the audit record of this run
    pub audit_document: EntityReference,
    /// Root under which migrated spaces are created
    pub target_root: EntityReference,
    /// Selected source spaces
    pub spaces: Vec<SpaceSelection>,
}

/// Space selection awaiting resolution to target references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceQuestion {
    pub spaces: Vec<SpaceSelection>,
}

impl SpaceQuestion {
    /// Question over the selected spaces. A key selected twice is asked once,
    /// at its first position.
    pub fn new(spaces: &[SpaceSelection]) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(spaces.len());
        for space in spaces {
            if seen.insert(space.key.as_str()) {
                unique.push(space.clone());
            }
        }
        Self { spaces: unique }
    }

    /// Check that an answer maps exactly the asked spaces, each once
    pub fn validate(&self, answer: &SpaceAnswer) -> Result<()> {
        let mut answered = HashSet::new();
        for (space, _) in &answer.entries {
            if !self.spaces.iter().any(|asked| asked.key == space.key) {
                return Err(MigrationError::InvalidState(format!(
                    "space {} was not selected",
                    space.key
                )));
            }
            if !answered.insert(space.key.as_str()) {
                return Err(MigrationError::InvalidState(format!(
                    "space {} answered twice",
                    space.key
                )));
            }
        }

        if let Some(missing) = self
            .spaces
            .iter()
            .find(|asked| !answered.contains(asked.key.as_str()))
        {
            return Err(MigrationError::InvalidState(format!(
                "no target chosen for space {}",
                missing.key
            )));
        }
        Ok(())
    }

    /// Answer mapping every space to `target_root.<space key>`
    pub fn default_answer(&self, target_root: &EntityReference) -> SpaceAnswer {
        SpaceAnswer {
            entries: self
                .spaces
                .iter()
                .map(|space| (space.clone(), target_root.child(&space.key)))
                .collect(),
        }
    }
}

/// Resolved space selection: each selected space and its chosen target
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpaceAnswer {
    pub entries: Vec<(SpaceSelection, EntityReference)>,
}

impl SpaceAnswer {
    pub fn new(entries: Vec<(SpaceSelection, EntityReference)>) -> Self {
        Self { entries }
    }

    pub fn target_for(&self, space_key: &str) -> Option<&EntityReference> {
        self.entries
            .iter()
            .find(|(space, _)| space.key == space_key)
            .map(|(_, target)| target)
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Job is created but not started
    Created,
    /// Job is running
    Running,
    /// Job reached its end without aborting
    FinishedSuccess,
    /// Job aborted
    FinishedFailure,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::FinishedSuccess | JobState::FinishedFailure)
    }

    /// Check a state transition. Terminal states are sinks.
    pub fn transition(self, next: JobState) -> Result<JobState> {
        let allowed = matches!(
            (self, next),
            (JobState::Created, JobState::Running)
                | (JobState::Running, JobState::FinishedSuccess)
                | (JobState::Running, JobState::FinishedFailure)
        );

        if allowed {
            Ok(next)
        } else {
            Err(MigrationError::InvalidState(format!(
                "cannot move from {} to {}",
                self, next
            )))
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Created => write!(f, "created"),
            JobState::Running => write!(f, "running"),
            JobState::FinishedSuccess => write!(f, "finished_success"),
            JobState::FinishedFailure => write!(f, "finished_failure"),
        }
    }
}

/// Log level of a job log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Entry of a job's execution log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Cause chain, only on errors that carry a cause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

/// Outcome of migrating one space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceResult {
    pub space: SpaceSelection,
    pub target: EntityReference,
    pub documents_migrated: u64,
    pub documents_failed: u64,
}

/// Frozen state of a job that reached a terminal state.
///
/// Produced once by the job and handed to listeners behind an `Arc`; nothing
/// can modify it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: String,
    pub job_type: String,
    pub request: MigrationRequest,
    pub answer: SpaceAnswer,
    pub state: JobState,
    pub results: Vec<SpaceResult>,
    pub log: Vec<LogEvent>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobSnapshot {
    /// Targets of the answered spaces that produced a result, in answer order
    pub fn migrated_spaces(&self) -> Vec<EntityReference> {
        self.answer
            .entries
            .iter()
            .filter(|(space, _)| self.results.iter().any(|r| r.space.key == space.key))
            .map(|(_, target)| target.clone())
            .collect()
    }

    pub fn logs_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.log)?)
    }

    pub fn succeeded(&self) -> bool {
        self.state == JobState::FinishedSuccess
    }

    pub fn error_count(&self) -> usize {
        self.log
            .iter()
            .filter(|event| event.level == LogLevel::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert_eq!(
            JobState::Created.transition(JobState::Running).unwrap(),
            JobState::Running
        );
        assert!(JobState::Running.transition(JobState::FinishedFailure).is_ok());
        assert!(JobState::Created.transition(JobState::FinishedSuccess).is_err());
        assert!(JobState::FinishedSuccess.transition(JobState::Running).is_err());
        assert!(JobState::FinishedFailure.transition(JobState::FinishedSuccess).is_err());
        assert!(JobState::Running.transition(JobState::Running).is_err());
    }

    #[test]
    fn test_child_reference_escapes_dots() {
        let root = EntityReference::new("Migrated");
        assert_eq!(root.child("ENG").as_str(), "Migrated.ENG");
        assert_eq!(root.child("v1.2").as_str(), "Migrated.v1\\.2");
    }

    #[test]
    fn test_default_answer_follows_selection_order() {
        let question = SpaceQuestion {
            spaces: vec![
                SpaceSelection::new("OPS", "Operations"),
                SpaceSelection::new("ENG", "Engineering"),
            ],
        };
        let answer = question.default_answer(&EntityReference::new("Wiki"));
        assert_eq!(answer.entries.len(), 2);
        assert_eq!(answer.entries[0].1.as_str(), "Wiki.OPS");
        assert_eq!(answer.target_for("ENG").unwrap().as_str(), "Wiki.ENG");
        assert!(answer.target_for("HR").is_none());
    }

    #[test]
    fn test_question_asks_each_space_once() {
        let question = SpaceQuestion::new(&[
            SpaceSelection::new("ENG", "Engineering"),
            SpaceSelection::new("OPS", "Operations"),
            SpaceSelection::new("ENG", "Engineering again"),
        ]);
        assert_eq!(question.spaces.len(), 2);
        assert_eq!(question.spaces[0].name, "Engineering");

        let answer = question.default_answer(&EntityReference::new("Migrated"));
        assert_eq!(answer.entries.len(), 2);
    }

    #[test]
    fn test_validate_answer() {
        let eng = SpaceSelection::new("ENG", "Engineering");
        let hr = SpaceSelection::new("HR", "People");
        let question = SpaceQuestion::new(&[eng.clone()]);

        let valid = SpaceAnswer::new(vec![(eng.clone(), EntityReference::new("Docs.ENG"))]);
        assert!(question.validate(&valid).is_ok());

        let unselected = SpaceAnswer::new(vec![(hr, EntityReference::new("Elsewhere.HR"))]);
        assert!(matches!(
            question.validate(&unselected),
            Err(MigrationError::InvalidState(_))
        ));

        let repeated = SpaceAnswer::new(vec![
            (eng.clone(), EntityReference::new("Docs.ENG")),
            (eng, EntityReference::new("Other.ENG")),
        ]);
        assert!(matches!(
            question.validate(&repeated),
            Err(MigrationError::InvalidState(_))
        ));

        assert!(matches!(
            question.validate(&SpaceAnswer::default()),
            Err(MigrationError::InvalidState(_))
        ));
    }

    #[test]
    fn test_log_level_serialization() {
        let json = serde_json::to_string(&LogLevel::Warn).unwrap();
        assert_eq!(json, "\"WARN\"");
    }
}
