//! Audit record persistence

use async_trait::async_trait;

use super::record::MigrationAuditRecord;
use crate::error::Result;
use crate::job::EntityReference;

/// Storage of audit records, one per audit document
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Create an unexecuted record for a document, or return the existing one
    async fn create_record(&self, document: &EntityReference) -> Result<MigrationAuditRecord>;

    async fn load_record(&self, document: &EntityReference) -> Result<Option<MigrationAuditRecord>>;

    /// Write an executed record as a single unit.
    ///
    /// Succeeds only while the stored record is still unexecuted. Returns
    /// `false` without writing when it was already executed.
    async fn save_executed(&self, record: &MigrationAuditRecord) -> Result<bool>;
}
