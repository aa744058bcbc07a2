//! Error types for the migration engine.

use thiserror::Error;

use crate::migration::MigrationDirection;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Boxed error used to carry the underlying storage failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The underlying datastore failed.
    #[error("Adapter error: {message}")]
    Adapter {
        /// Human readable description.
        message: String,
        /// Original cause, when one is available.
        #[source]
        source: Option<BoxError>,
    },

    /// A statement was rejected by the datastore (syntax error or constraint violation).
    #[error("Statement error: {message} (statement: `{statement}`)")]
    Statement {
        /// The offending statement.
        statement: String,
        /// Message reported by the datastore.
        message: String,
    },

    /// Another process holds the migration lock.
    #[error("Migrations are locked{}", holder_suffix(.holder))]
    Locked {
        /// Holder metadata recorded with the lock, if any.
        holder: Option<String>,
    },

    /// Two migrations share the same name.
    #[error("Duplicate migration name '{0}'")]
    Duplicate(String),

    /// An identifier passed to an introspection helper is not a simple identifier.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A migration's `up` or `down` failed.
    #[error("Migration '{migration}' failed during {direction}: {source}")]
    Failed {
        /// Name of the failing migration.
        migration: String,
        /// Direction that was running.
        direction: MigrationDirection,
        /// The error raised by the migration.
        #[source]
        source: Box<MigrationError>,
    },

    /// Migration not found.
    #[error("Migration '{0}' not found")]
    NotFound(String),

    /// Migration has no down procedure.
    #[error("Migration '{0}' cannot be reverted")]
    Irreversible(String),

    /// Invalid migration file or format.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn holder_suffix(holder: &Option<String>) -> String {
    holder
        .as_deref()
        .map(|h| format!(" by {h}"))
        .unwrap_or_default()
}

impl MigrationError {
    /// Create an adapter error without an underlying cause.
    pub fn adapter(msg: impl Into<String>) -> Self {
        Self::Adapter {
            message: msg.into(),
            source: None,
        }
    }

    /// Create an adapter error wrapping the original cause.
    pub fn adapter_with(msg: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Adapter {
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    /// Create a statement error.
    pub fn statement(statement: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Statement {
            statement: statement.into(),
            message: msg.into(),
        }
    }

    /// Create a locked error.
    pub fn locked(holder: Option<String>) -> Self {
        Self::Locked { holder }
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Wrap an error raised while running a migration.
    pub fn failed(migration: impl Into<String>, direction: MigrationDirection, source: Self) -> Self {
        Self::Failed {
            migration: migration.into(),
            direction,
            source: Box::new(source),
        }
    }

    /// Check if this is a recoverable error.
    ///
    /// Only lock contention is recoverable: the caller may retry once the
    /// other process finishes.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.root(), Self::Locked { .. })
    }

    /// The innermost error, looking through [`MigrationError::Failed`].
    pub fn root(&self) -> &Self {
        match self {
            Self::Failed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the migration responsible for this error, if any.
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            Self::Failed { migration, .. } => Some(migration),
            _ => None,
        }
    }
}
