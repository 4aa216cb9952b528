//! Storage backends
//!
//! - [`sqlite`]: SQLite storage for migrated documents, metadata tags and
//!   audit records

pub mod sqlite;

pub use sqlite::SqliteStore;
