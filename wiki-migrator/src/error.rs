use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Audit record already executed: {0}")]
    AlreadyExecuted(String),

    #[error("Invalid job state: {0}")]
    InvalidState(String),

    #[error("Cancellation requested: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrationError {
    /// Whether this fault should abort a running job instead of being
    /// recorded against a single document
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            MigrationError::Infrastructure(_) | MigrationError::Database(_) | MigrationError::Io(_)
        )
    }

    /// Cause chain of this error, outermost first
    pub fn trace(&self) -> Vec<String> {
        let mut frames = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            frames.push(cause.to_string());
            source = cause.source();
        }
        frames
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
