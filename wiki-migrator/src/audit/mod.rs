//! Migration audit
//!
//! Every migration request names an audit document. When the job finishes,
//! the [`JobCompletionHandler`] stores which spaces were migrated together
//! with the full execution log, and marks the record executed.

pub mod handler;
pub mod record;
pub mod store;

pub use handler::{HandleOutcome, JobCompletionHandler};
pub use record::{JobOutcome, MigrationAuditRecord};
pub use store::AuditStore;
