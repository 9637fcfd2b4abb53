use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Template not found: {0}")]
    TemplateNotFound(Uuid),

    /// An occurrence referenced by a plan disappeared before it could be applied.
    #[error("Occurrence not found: {0}")]
    MissingOccurrence(Uuid),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Rollback incomplete after error: {cause} ({} restore failures)", failures.len())]
    RollbackIncomplete {
        #[source]
        cause: Box<CoreError>,
        failures: Vec<String>,
    },
}

impl CoreError {
    /// The error that started a rollback, looking through `RollbackIncomplete`.
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::RollbackIncomplete { cause, .. } => cause.root(),
            other => other,
        }
    }
}
