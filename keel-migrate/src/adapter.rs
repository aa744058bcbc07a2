//! Datastore adapter contract.
//!
//! An [`Adapter`] wraps raw statement execution against the datastore and owns
//! the bookkeeping tables: the executed-migrations ledger and the single-row
//! migration lock. It knows nothing about migration semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;

/// A result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Work executed inside [`Adapter::transaction`].
pub type TransactionWork = Box<dyn FnOnce(&mut dyn Executor) -> MigrateResult<()> + Send>;

/// A statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary data.
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Text(v.to_rfc3339())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Number of rows changed by the statement.
    pub changes: usize,
    /// Row id of the last inserted row.
    pub last_insert_id: i64,
}

/// A record of an executed migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration name.
    pub name: String,
    /// When the migration was applied.
    pub executed_at: DateTime<Utc>,
}

/// Diagnostic view of the lock row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// When the lock was taken.
    pub locked_at: Option<DateTime<Utc>>,
    /// Identifier of the process instance holding the lock.
    pub locked_by: Option<String>,
}

/// Synchronous statement execution, available inside a transaction.
///
/// Nested transactions cannot be opened from an `Executor`.
pub trait Executor {
    /// Execute a statement that returns no rows.
    fn exec(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<()>;

    /// Execute several `;`-separated statements without parameters.
    fn exec_batch(&mut self, sql: &str) -> MigrateResult<()>;

    /// Run a query and return every row.
    fn all(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>>;

    /// Run a query and return the first row, if any.
    fn get(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Option<Row>>;

    /// Execute a write statement and report the affected rows.
    fn run(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<RunResult>;
}

/// Capability set every datastore binding implements.
#[async_trait::async_trait]
pub trait Adapter: Send + Sync {
    /// Execute a statement that returns no rows.
    async fn exec(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<()>;

    /// Execute several `;`-separated statements without parameters.
    async fn exec_batch(&self, sql: &str) -> MigrateResult<()>;

    /// Run a query and return every row.
    async fn all(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>>;

    /// Run a query and return the first row, if any.
    async fn get(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Option<Row>>;

    /// Execute a write statement and report the affected rows.
    async fn run(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<RunResult>;

    /// Run `work` so that all of its writes commit together or not at all.
    ///
    /// If `work` returns an error the transaction is rolled back and the
    /// error is returned unchanged.
    async fn transaction(&self, work: TransactionWork) -> MigrateResult<()>;

    /// Create the ledger and lock tables if they do not exist.
    async fn ensure_migration_table(&self) -> MigrateResult<()>;

    /// All executed migrations, ordered by name.
    async fn get_executed_migrations(&self) -> MigrateResult<Vec<MigrationRecord>>;

    /// Record a migration as executed.
    async fn record_migration(&self, name: &str) -> MigrateResult<()>;

    /// Remove a migration from the ledger.
    async fn remove_migration(&self, name: &str) -> MigrateResult<()>;

    /// Try to take the migration lock.
    ///
    /// Returns `false` when another instance already holds it. Implementations
    /// must use an atomic compare-and-set in the datastore.
    async fn acquire_migration_lock(&self) -> MigrateResult<bool>;

    /// Release the migration lock, regardless of who holds it.
    async fn release_migration_lock(&self) -> MigrateResult<()>;

    /// Current lock holder, or `None` when the lock is free.
    async fn lock_holder(&self) -> MigrateResult<Option<LockInfo>>;

    /// Close the underlying connection.
    async fn close(&self) -> MigrateResult<()>;
}
