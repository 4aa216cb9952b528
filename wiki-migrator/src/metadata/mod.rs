//! Metadata tags attached to migrated content

pub mod schema;

pub use schema::{FieldKind, MigrationMetadata, METADATA_SCHEMA};
