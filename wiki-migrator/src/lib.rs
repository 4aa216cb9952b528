//! wiki-migrator: Space migration between wiki formats
//!
//! Migrates whole spaces from a source wiki export into a target wiki,
//! rewriting source macros into their target equivalents and recording each
//! run in an audit document.
//!
//! # Features
//!
//! - **Macro conversion**: Pluggable converters dispatched by macro id
//! - **Migration jobs**: Concurrent per-space migration with an ordered log
//! - **Audit**: Exactly one durable record per finished job
//! - **Storage**: SQLite for migrated documents, metadata and audit records
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wiki_migrator::audit::{AuditStore, JobCompletionHandler};
//! use wiki_migrator::config::MigrationConfiguration;
//! use wiki_migrator::events::EventBus;
//! use wiki_migrator::job::{EntityReference, JsonExportSource, MigrationJob, MigrationRequest, SpaceSelection};
//! use wiki_migrator::macros::MacroConverterRegistry;
//! use wiki_migrator::store::SqliteStore;
//! use wiki_migrator::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let registry = MacroConverterRegistry::with_builtins(
//!         &config.extension_ids()?,
//!         &config.migration.tasklist_marker,
//!     );
//!     let store = Arc::new(SqliteStore::connect(&config.storage.database_url).await?);
//!     let audit = EntityReference::new("Admin.Audit");
//!     store.create_record(&audit).await?;
//!
//!     let bus = EventBus::new();
//!     let handler = JobCompletionHandler::new(store.clone()).spawn(&bus);
//!
//!     let request = MigrationRequest {
//!         audit_document: audit,
//!         target_root: EntityReference::new("Migrated"),
//!         spaces: vec![SpaceSelection::new("ENG", "Engineering")],
//!     };
//!     let source = Arc::new(JsonExportSource::from_file("export.json").await?);
//!     let job = MigrationJob::new(request, Arc::new(registry), source, store);
//!     job.run(&bus).await;
//!
//!     drop(bus);
//!     handler.await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`audit`]: Audit records and the job completion handler
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`events`]: Job finished signals
//! - [`job`]: Migration jobs and their sources/targets
//! - [`macros`]: Macro converters and their registry
//! - [`metadata`]: Metadata tags attached to migrated content
//! - [`store`]: Storage backends

pub mod audit;
pub mod config;
pub mod error;
pub mod events;
pub mod job;
pub mod macros;
pub mod metadata;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{Config, MigrationConfiguration};
pub use error::{MigrationError, Result};
pub use events::{EventBus, JobFinishedEvent};
pub use job::MigrationJob;
pub use macros::{MacroConverter, MacroConverterRegistry};
