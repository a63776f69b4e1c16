use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Database query failed: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Database operation '{0}' exceeded its deadline")]
    Timeout(&'static str),

    #[error("No strategy named '{0}' exists")]
    NotFound(String),

    #[error("Stored row could not be mapped: {0}")]
    InvalidRow(String),

    #[error("Write rejected: {0}")]
    WriteRejected(String),
}
