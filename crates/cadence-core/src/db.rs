use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use crate::error::CoreError;

// Re-export the pool for use in other parts of the core crate
pub use sqlx::SqlitePool as DbPool;

/// Establishes a connection pool to the SQLite database and runs migrations.
///
/// # Arguments
///
/// * `db_path` - The path to the SQLite database file, or `sqlite::memory:`.
///
/// # Returns
///
/// A `Result` containing the `SqlitePool` or a `CoreError` if the connection fails
/// or migrations cannot be run.
pub async fn establish_connection(db_path: &str) -> Result<SqlitePool, CoreError> {
    let options = if db_path == "sqlite::memory:" {
        SqliteConnectOptions::from_str(db_path)?
    } else {
        // Create the directory if it doesn't exist
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
    };

    tracing::info!("Opening database at {}", db_path);

    // An in-memory database lives and dies with its connection
    let max_connections = if db_path == "sqlite::memory:" { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    tracing::debug!("Database migrations applied");
    Ok(pool)
}
