//! Fixtures shared by unit tests

use chrono::Utc;

use crate::job::{
    EntityReference, JobSnapshot, JobState, LogEvent, LogLevel, MigrationRequest, SpaceAnswer,
    SpaceResult, SpaceSelection, MIGRATION_JOB_TYPE,
};

/// Finished job over the single space `ENG`, audited in `Admin.Audit`
pub fn snapshot(state: JobState) -> JobSnapshot {
    let eng = SpaceSelection::new("ENG", "Engineering");
    let target = EntityReference::new("Migrated.ENG");
    JobSnapshot {
        id: "job-1".to_string(),
        job_type: MIGRATION_JOB_TYPE.to_string(),
        request: MigrationRequest {
            audit_document: EntityReference::new("Admin.Audit"),
            target_root: EntityReference::new("Migrated"),
            spaces: vec![eng.clone()],
        },
        answer: SpaceAnswer::new(vec![(eng.clone(), target.clone())]),
        state,
        results: vec![SpaceResult {
            space: eng,
            target,
            documents_migrated: 3,
            documents_failed: 0,
        }],
        log: vec![LogEvent {
            level: LogLevel::Info,
            timestamp: Utc::now(),
            message: "Migrated space ENG".to_string(),
            trace: None,
        }],
        started_at: Utc::now(),
        finished_at: Utc::now(),
    }
}
