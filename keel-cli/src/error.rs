//! CLI error types and result alias.

use keel_migrate::MigrationError;
use keel_sqlite::SqliteError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(keel::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(keel::config))]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    #[diagnostic(code(keel::database))]
    Database(String),

    /// Another process holds the migration lock
    #[error("{0}")]
    #[diagnostic(
        code(keel::locked),
        help("wait for the other process to finish; if it crashed, run `keel unlock --force`")
    )]
    Locked(MigrationError),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(keel::migration))]
    Migration(MigrationError),

    /// Command refused or misused
    #[error("Command error: {0}")]
    #[diagnostic(code(keel::command))]
    Command(String),
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        if err.is_recoverable() {
            CliError::Locked(err)
        } else {
            CliError::Migration(err)
        }
    }
}

impl From<SqliteError> for CliError {
    fn from(err: SqliteError) -> Self {
        CliError::Database(err.to_string())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}
