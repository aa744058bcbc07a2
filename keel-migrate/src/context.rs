//! Per-invocation helper context handed to every migration.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;

use crate::adapter::{Adapter, Executor, SqlValue};
use crate::error::{MigrateResult, MigrationError};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Check that `ident` is a plain SQL identifier.
///
/// Only ASCII letters, digits and underscores are accepted, and the first
/// character may not be a digit.
pub fn validate_identifier(ident: &str) -> MigrateResult<&str> {
    if IDENTIFIER.is_match(ident) {
        Ok(ident)
    } else {
        Err(MigrationError::InvalidIdentifier(ident.to_string()))
    }
}

/// Helpers available to a migration while it runs.
///
/// A context is created for each `up`/`down` call and dropped right after;
/// it carries no state between calls.
#[derive(Clone, Copy)]
pub struct MigrationContext<'a> {
    adapter: &'a dyn Adapter,
}

impl<'a> MigrationContext<'a> {
    /// Create a context over the given adapter.
    pub fn new(adapter: &'a dyn Adapter) -> Self {
        Self { adapter }
    }

    /// The raw adapter.
    pub fn adapter(&self) -> &'a dyn Adapter {
        self.adapter
    }

    /// Current UTC time.
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Check whether a table exists.
    pub async fn table_exists(&self, table: &str) -> MigrateResult<bool> {
        let table = validate_identifier(table)?;
        let row = self
            .adapter
            .get(
                "SELECT 1 AS found FROM sqlite_master WHERE type = 'table' AND name = ?1",
                &[SqlValue::from(table)],
            )
            .await?;
        Ok(row.is_some())
    }

    /// Check whether `column` exists on `table`.
    ///
    /// Returns `false` when the table itself does not exist.
    pub async fn column_exists(&self, table: &str, column: &str) -> MigrateResult<bool> {
        let table = validate_identifier(table)?;
        let column = validate_identifier(column)?;
        let columns = self
            .adapter
            .all(&format!("PRAGMA table_info(\"{table}\")"), &[])
            .await?;
        Ok(columns.iter().any(|row| {
            row.get("name")
                .and_then(|v| v.as_str())
                .is_some_and(|name| name.eq_ignore_ascii_case(column))
        }))
    }

    /// Run `work` inside a single adapter transaction.
    pub async fn transaction<F>(&self, work: F) -> MigrateResult<()>
    where
        F: FnOnce(&mut dyn Executor) -> MigrateResult<()> + Send + 'static,
    {
        self.adapter.transaction(Box::new(work)).await
    }
}
