//! SQLite-backed target wiki and audit storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use crate::audit::{AuditStore, JobOutcome, MigrationAuditRecord};
use crate::error::{MigrationError, Result};
use crate::job::{EntityReference, TargetDocument, TargetStore};
use crate::metadata::MigrationMetadata;

/// Stores migrated documents, their metadata tags and audit records
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the database at `database_url` and
    /// initialize its tables
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let db = SqlitePool::connect_with(options).await?;

        let store = Self::new(db);
        store.init_db().await?;
        info!("Opened migration store at {}", database_url);
        Ok(store)
    }

    /// Private in-memory database on a single connection
    pub async fn in_memory() -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self::new(db);
        store.init_db().await?;
        Ok(store)
    }

    /// Initialize database tables
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS migration_audit (
                document TEXT PRIMARY KEY,
                executed BOOLEAN NOT NULL DEFAULT 0,
                job_id TEXT,
                outcome TEXT,
                migrated_spaces TEXT NOT NULL DEFAULT '[]',
                logs_json TEXT NOT NULL DEFAULT '[]',
                executed_at TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS migrated_documents (
                reference TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS migration_metadata (
                reference TEXT PRIMARY KEY,
                key TEXT NOT NULL,
                lower_key TEXT NOT NULL,
                space_key TEXT NOT NULL,
                lower_space_key TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                fields TEXT NOT NULL,
                lower_fields TEXT NOT NULL,
                FOREIGN KEY (reference) REFERENCES migrated_documents(reference) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_migration_metadata_key ON migration_metadata(lower_key)",
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_migration_metadata_space ON migration_metadata(lower_space_key)",
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Get a migrated document by reference
    pub async fn get_document(&self, reference: &EntityReference) -> Result<Option<TargetDocument>> {
        let row = sqlx::query(
            "SELECT reference, title, content FROM migrated_documents WHERE reference = ?",
        )
        .bind(reference.as_str())
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let metadata = sqlx::query("SELECT * FROM migration_metadata WHERE reference = ?")
            .bind(reference.as_str())
            .fetch_optional(&self.db)
            .await?
            .map(row_to_metadata)
            .transpose()?;

        Ok(Some(TargetDocument {
            reference: EntityReference::new(row.try_get::<String, _>("reference")?),
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            metadata,
        }))
    }

    /// Metadata tags whose key matches, ignoring case
    pub async fn find_metadata_by_key(&self, key: &str) -> Result<Vec<MigrationMetadata>> {
        let rows = sqlx::query("SELECT * FROM migration_metadata WHERE lower_key = ? ORDER BY reference")
            .bind(key.to_lowercase())
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(row_to_metadata).collect()
    }

    /// Metadata tags of one source space, ignoring case
    pub async fn find_metadata_by_space(&self, space_key: &str) -> Result<Vec<MigrationMetadata>> {
        let rows = sqlx::query(
            "SELECT * FROM migration_metadata WHERE lower_space_key = ? ORDER BY reference",
        )
        .bind(space_key.to_lowercase())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(row_to_metadata).collect()
    }

    /// Number of migrated documents
    pub async fn document_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM migrated_documents")
            .fetch_one(&self.db)
            .await?;
        Ok(row.try_get("count")?)
    }
}

#[async_trait]
impl TargetStore for SqliteStore {
    async fn save_document(&self, document: TargetDocument) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO migrated_documents (reference, title, content, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(reference) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(document.reference.as_str())
        .bind(&document.title)
        .bind(&document.content)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM migration_metadata WHERE reference = ?")
            .bind(document.reference.as_str())
            .execute(&mut *tx)
            .await?;

        if let Some(metadata) = &document.metadata {
            sqlx::query(
                r#"
                INSERT INTO migration_metadata (
                    reference, key, lower_key, space_key, lower_space_key,
                    title, description, fields, lower_fields
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document.reference.as_str())
            .bind(metadata.key())
            .bind(metadata.lower_key())
            .bind(metadata.space_key())
            .bind(metadata.lower_space_key())
            .bind(metadata.title())
            .bind(metadata.description())
            .bind(serde_json::to_string(metadata.fields())?)
            .bind(serde_json::to_string(metadata.lower_fields())?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Saved document {}", document.reference);
        Ok(())
    }
}

#[async_trait]
impl AuditStore for SqliteStore {
    async fn create_record(&self, document: &EntityReference) -> Result<MigrationAuditRecord> {
        sqlx::query(
            r#"
            INSERT INTO migration_audit (document, executed, created_at)
            VALUES (?, 0, ?)
            ON CONFLICT(document) DO NOTHING
            "#,
        )
        .bind(document.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        self.load_record(document)
            .await?
            .ok_or_else(|| MigrationError::NotFound(format!("audit document {}", document)))
    }

    async fn load_record(&self, document: &EntityReference) -> Result<Option<MigrationAuditRecord>> {
        let row = sqlx::query(
            r#"
            SELECT document, executed, job_id, outcome, migrated_spaces, logs_json, executed_at
            FROM migration_audit
            WHERE document = ?
            "#,
        )
        .bind(document.as_str())
        .fetch_optional(&self.db)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn save_executed(&self, record: &MigrationAuditRecord) -> Result<bool> {
        if !record.executed {
            return Err(MigrationError::Persistence(format!(
                "refusing to save unexecuted record for {}",
                record.document
            )));
        }

        let mut tx = self.db.begin().await?;

        let exists = sqlx::query("SELECT executed FROM migration_audit WHERE document = ?")
            .bind(record.document.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(MigrationError::NotFound(format!(
                "audit document {}",
                record.document
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE migration_audit
            SET executed = 1, job_id = ?, outcome = ?, migrated_spaces = ?,
                logs_json = ?, executed_at = ?
            WHERE document = ? AND executed = 0
            "#,
        )
        .bind(&record.job_id)
        .bind(record.outcome.map(|o| o.as_str()))
        .bind(serde_json::to_string(&record.migrated_spaces)?)
        .bind(&record.logs_json)
        .bind(record.executed_at.unwrap_or_else(Utc::now).to_rfc3339())
        .bind(record.document.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }
}

fn row_to_record(row: SqliteRow) -> Result<MigrationAuditRecord> {
    let document: String = row.try_get("document")?;
    let outcome: Option<String> = row.try_get("outcome")?;
    let migrated_spaces: String = row.try_get("migrated_spaces")?;
    let executed_at: Option<String> = row.try_get("executed_at")?;

    let outcome = match outcome {
        Some(value) => Some(JobOutcome::parse(&value).ok_or_else(|| {
            MigrationError::Persistence(format!("unknown outcome '{}' in {}", value, document))
        })?),
        None => None,
    };

    let executed_at = match executed_at {
        Some(value) => Some(
            DateTime::parse_from_rfc3339(&value)
                .map_err(|e| MigrationError::Persistence(e.to_string()))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    Ok(MigrationAuditRecord {
        document: EntityReference::new(document),
        executed: row.try_get("executed")?,
        job_id: row.try_get("job_id")?,
        outcome,
        migrated_spaces: serde_json::from_str(&migrated_spaces)?,
        logs_json: row.try_get("logs_json")?,
        executed_at,
    })
}

fn row_to_metadata(row: SqliteRow) -> Result<MigrationMetadata> {
    let fields: String = row.try_get("fields")?;
    let fields: Vec<String> = serde_json::from_str(&fields)?;

    Ok(MigrationMetadata::new(
        row.try_get::<String, _>("key")?,
        row.try_get::<String, _>("space_key")?,
        row.try_get::<String, _>("title")?,
    )
    .with_description(row.try_get::<String, _>("description")?)
    .with_fields(fields))
}
