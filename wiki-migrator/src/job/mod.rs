//! Migration jobs
//!
//! A job converts the selected source spaces into target documents, keeps an
//! ordered execution log and ends in a frozen [`JobSnapshot`] that is handed
//! to the completion handler through the event bus.

pub mod log;
pub mod runner;
pub mod source;
pub mod types;

pub use log::JobLog;
pub use runner::MigrationJob;
pub use source::{ContentBlock, JsonExportSource, SourceDocument, SpaceSource, TargetDocument, TargetStore};
pub use types::*;
