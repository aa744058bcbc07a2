//! Error types for SQLite operations.

use std::fmt;

use keel_migrate::MigrationError;
use rusqlite::ErrorCode;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug)]
pub enum SqliteError {
    /// SQLite driver error.
    Sqlite(tokio_rusqlite::Error),
    /// Configuration error.
    Config(String),
    /// Connection error.
    Connection(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}

impl fmt::Display for SqliteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "SQLite error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Connection(msg) => write!(f, "Connection error: {}", msg),
        }
    }
}

impl std::error::Error for SqliteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tokio_rusqlite::Error> for SqliteError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<SqliteError> for MigrationError {
    fn from(err: SqliteError) -> Self {
        let message = err.to_string();
        MigrationError::adapter_with(message, err)
    }
}

/// Whether the driver rejected the statement itself rather than failing to
/// reach the database.
fn is_statement_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => is_statement_code(e.code),
        // Syntax errors carry the offending SQL and offset.
        rusqlite::Error::SqlInputError { error, .. } => is_statement_code(error.code),
        rusqlite::Error::ExecuteReturnedResults
        | rusqlite::Error::InvalidParameterCount(_, _)
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::MultipleStatement => true,
        _ => false,
    }
}

fn is_statement_code(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::Unknown | ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch
    )
}

/// Map a driver error raised while running `sql`.
pub(crate) fn statement_error(sql: &str, err: rusqlite::Error) -> MigrationError {
    if is_statement_error(&err) {
        MigrationError::statement(sql.trim(), err.to_string())
    } else {
        SqliteError::from(err).into()
    }
}
