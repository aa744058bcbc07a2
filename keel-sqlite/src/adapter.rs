//! SQLite implementation of the migration [`Adapter`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{TransactionBehavior, params_from_iter};
use serde_json::Value as JsonValue;
use tokio_rusqlite::Connection;
use tracing::{debug, trace, warn};

use keel_migrate::{
    Adapter, Executor, LockInfo, MigrateResult, MigrationError, MigrationRecord, Row, RunResult,
    SqlValue, TransactionWork, validate_identifier,
};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult, statement_error};
use crate::types::{row_to_map, to_sqlite_params};

/// Default name of the executed-migrations ledger table.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "_keel_migrations";

/// Default name of the migration lock table.
pub const DEFAULT_LOCK_TABLE: &str = "_keel_migrations_lock";

/// Statement execution against a borrowed rusqlite connection.
///
/// Used both for single statements and inside [`Adapter::transaction`].
pub struct SqliteExecutor<'c> {
    conn: &'c rusqlite::Connection,
}

impl<'c> SqliteExecutor<'c> {
    fn new(conn: &'c rusqlite::Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, params: &[SqlValue], limit: Option<usize>) -> MigrateResult<Vec<Row>> {
        trace!(sql = %sql, "Executing query");
        let map_err = |e| statement_error(sql, e);

        let mut stmt = self.conn.prepare(sql).map_err(map_err)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt
            .query(params_from_iter(to_sqlite_params(params)))
            .map_err(map_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().map_err(map_err)? {
            results.push(row_to_map(row, &columns));
            if limit.is_some_and(|l| results.len() >= l) {
                break;
            }
        }
        Ok(results)
    }
}

impl Executor for SqliteExecutor<'_> {
    fn exec(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<()> {
        self.run(sql, params).map(|_| ())
    }

    fn exec_batch(&mut self, sql: &str) -> MigrateResult<()> {
        trace!(sql = %sql, "Executing batch");
        self.conn
            .execute_batch(sql)
            .map_err(|e| statement_error(sql, e))
    }

    fn all(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        self.query(sql, params, None)
    }

    fn get(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Option<Row>> {
        Ok(self.query(sql, params, Some(1))?.into_iter().next())
    }

    fn run(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<RunResult> {
        trace!(sql = %sql, "Executing statement");
        let changes = self
            .conn
            .execute(sql, params_from_iter(to_sqlite_params(params)))
            .map_err(|e| statement_error(sql, e))?;
        Ok(RunResult {
            changes,
            last_insert_id: self.conn.last_insert_rowid(),
        })
    }
}

/// Migration adapter backed by a single SQLite connection.
///
/// All statements run on one `tokio-rusqlite` background thread, so the
/// adapter serializes its own work. Coordination with other processes goes
/// through the lock table.
pub struct SqliteAdapter {
    conn: Mutex<Option<Connection>>,
    config: SqliteConfig,
    migrations_table: String,
    lock_table: String,
    instance_id: String,
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("path", &self.config.path)
            .field("migrations_table", &self.migrations_table)
            .field("lock_table", &self.lock_table)
            .field("instance_id", &self.instance_id)
            .field("closed", &self.conn.lock().is_none())
            .finish()
    }
}

impl SqliteAdapter {
    /// Open the database described by `config` and apply its pragmas.
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let init_sql = config.init_sql();

        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path.clone()).await?,
        };

        conn.call(move |conn| {
            conn.execute_batch(&init_sql)?;
            Ok(())
        })
        .await?;

        let instance_id = format!("{}:{}", std::process::id(), uuid::Uuid::new_v4());
        debug!(path = %config.path.as_str(), instance_id = %instance_id, "Opened SQLite database");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            config,
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            lock_table: DEFAULT_LOCK_TABLE.to_string(),
            instance_id,
        })
    }

    /// Use custom names for the ledger and lock tables.
    pub fn with_tables(
        mut self,
        migrations_table: impl Into<String>,
        lock_table: impl Into<String>,
    ) -> MigrateResult<Self> {
        let migrations_table = migrations_table.into();
        let lock_table = lock_table.into();
        validate_identifier(&migrations_table)?;
        validate_identifier(&lock_table)?;
        if migrations_table.eq_ignore_ascii_case(&lock_table) {
            return Err(MigrationError::InvalidIdentifier(lock_table));
        }

        self.migrations_table = migrations_table;
        self.lock_table = lock_table;
        Ok(self)
    }

    /// The configuration this adapter was opened with.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Name of the executed-migrations ledger table.
    pub fn migrations_table(&self) -> &str {
        &self.migrations_table
    }

    /// Name of the migration lock table.
    pub fn lock_table(&self) -> &str {
        &self.lock_table
    }

    /// Identifier written to the lock row while this adapter holds it.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn conn(&self) -> SqliteResult<Connection> {
        self.conn
            .lock()
            .clone()
            .ok_or_else(|| SqliteError::connection("connection is closed"))
    }

    async fn with_executor<T, F>(&self, f: F) -> MigrateResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteExecutor<'_>) -> MigrateResult<T> + Send + 'static,
    {
        let conn = self.conn()?;
        conn.call(move |c| Ok(f(&mut SqliteExecutor::new(c))))
            .await
            .map_err(SqliteError::from)?
    }
}

fn record_from_row(row: &Row) -> MigrateResult<MigrationRecord> {
    let name = row
        .get("name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| MigrationError::adapter("ledger row is missing its name"))?;
    let executed_at = row
        .get("executed_at")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| MigrationError::adapter(format!("ledger row '{name}' has no timestamp")))?;
    let executed_at = parse_timestamp(executed_at)?;

    Ok(MigrationRecord {
        name: name.to_string(),
        executed_at,
    })
}

fn parse_timestamp(value: &str) -> MigrateResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MigrationError::adapter_with(format!("invalid timestamp '{value}'"), e))
}

#[async_trait]
impl Adapter for SqliteAdapter {
    async fn exec(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<()> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.with_executor(move |ex| ex.exec(&sql, &params)).await
    }

    async fn exec_batch(&self, sql: &str) -> MigrateResult<()> {
        let sql = sql.to_string();
        self.with_executor(move |ex| ex.exec_batch(&sql)).await
    }

    async fn all(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.with_executor(move |ex| ex.all(&sql, &params)).await
    }

    async fn get(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Option<Row>> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.with_executor(move |ex| ex.get(&sql, &params)).await
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<RunResult> {
        let (sql, params) = (sql.to_string(), params.to_vec());
        self.with_executor(move |ex| ex.run(&sql, &params)).await
    }

    async fn transaction(&self, work: TransactionWork) -> MigrateResult<()> {
        let conn = self.conn()?;
        conn.call(move |c| {
            let tx = c.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let outcome = work(&mut SqliteExecutor::new(&tx));
            if outcome.is_ok() {
                tx.commit()?;
                trace!("Transaction committed");
            } else {
                tx.rollback()?;
                trace!("Transaction rolled back");
            }
            Ok(outcome)
        })
        .await
        .map_err(SqliteError::from)?
    }

    async fn ensure_migration_table(&self) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{ledger}\" (
                name TEXT PRIMARY KEY,
                executed_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS \"{lock}\" (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                locked INTEGER NOT NULL DEFAULT 0,
                locked_at TEXT,
                locked_by TEXT
            );
            INSERT OR IGNORE INTO \"{lock}\" (id, locked) VALUES (1, 0);",
            ledger = self.migrations_table,
            lock = self.lock_table,
        );
        self.exec_batch(&sql).await
    }

    async fn get_executed_migrations(&self) -> MigrateResult<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT name, executed_at FROM \"{}\" ORDER BY name",
            self.migrations_table
        );
        let rows = self.all(&sql, &[]).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn record_migration(&self, name: &str) -> MigrateResult<()> {
        let sql = format!(
            "INSERT INTO \"{}\" (name, executed_at) VALUES (?1, ?2)",
            self.migrations_table
        );
        self.exec(&sql, &[name.into(), Utc::now().into()]).await
    }

    async fn remove_migration(&self, name: &str) -> MigrateResult<()> {
        let sql = format!("DELETE FROM \"{}\" WHERE name = ?1", self.migrations_table);
        self.exec(&sql, &[name.into()]).await
    }

    async fn acquire_migration_lock(&self) -> MigrateResult<bool> {
        let sql = format!(
            "UPDATE \"{}\" SET locked = 1, locked_at = ?1, locked_by = ?2
             WHERE id = 1 AND locked = 0",
            self.lock_table
        );
        let result = self
            .run(&sql, &[Utc::now().into(), self.instance_id.as_str().into()])
            .await?;

        let acquired = result.changes == 1;
        debug!(instance_id = %self.instance_id, acquired, "Migration lock requested");
        Ok(acquired)
    }

    async fn release_migration_lock(&self) -> MigrateResult<()> {
        let sql = format!(
            "UPDATE \"{}\" SET locked = 0, locked_at = NULL, locked_by = NULL WHERE id = 1",
            self.lock_table
        );
        self.exec(&sql, &[]).await?;
        debug!(instance_id = %self.instance_id, "Migration lock released");
        Ok(())
    }

    async fn lock_holder(&self) -> MigrateResult<Option<LockInfo>> {
        let sql = format!(
            "SELECT locked, locked_at, locked_by FROM \"{}\" WHERE id = 1",
            self.lock_table
        );
        let Some(row) = self.get(&sql, &[]).await? else {
            return Ok(None);
        };

        if row.get("locked").and_then(JsonValue::as_i64).unwrap_or(0) == 0 {
            return Ok(None);
        }

        let locked_at = row
            .get("locked_at")
            .and_then(JsonValue::as_str)
            .map(parse_timestamp)
            .transpose()?;
        let locked_by = row
            .get("locked_by")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        Ok(Some(LockInfo {
            locked_at,
            locked_by,
        }))
    }

    async fn close(&self) -> MigrateResult<()> {
        let conn = self.conn.lock().take();
        match conn {
            Some(conn) => {
                conn.close().await.map_err(SqliteError::from)?;
                debug!(path = %self.config.path.as_str(), "Closed SQLite database");
            }
            None => warn!("SQLite adapter already closed"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn memory_adapter() -> SqliteAdapter {
        SqliteAdapter::open(SqliteConfig::memory()).await.unwrap()
    }

    async fn file_adapter(dir: &TempDir) -> SqliteAdapter {
        SqliteAdapter::open(SqliteConfig::file(dir.path().join("keel.db")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_statement_execution() {
        let adapter = memory_adapter().await;
        adapter
            .exec_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
            .await
            .unwrap();

        let result = adapter
            .run("INSERT INTO users (name) VALUES (?1)", &["ada".into()])
            .await
            .unwrap();
        assert_eq!(result.changes, 1);
        assert_eq!(result.last_insert_id, 1);

        adapter
            .exec("INSERT INTO users (name) VALUES (?1)", &["grace".into()])
            .await
            .unwrap();

        let rows = adapter
            .all("SELECT id, name FROM users ORDER BY id", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["name"], JsonValue::String("grace".into()));

        let row = adapter
            .get("SELECT name FROM users WHERE id = ?1", &[1i64.into()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["name"], JsonValue::String("ada".into()));

        let missing = adapter
            .get("SELECT name FROM users WHERE id = ?1", &[99i64.into()])
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_syntax_error_reports_statement() {
        let adapter = memory_adapter().await;
        let err = adapter.exec_batch("CREATE TABLEX broken (id);").await.unwrap_err();
        assert!(matches!(err, MigrationError::Statement { .. }));
        assert!(err.to_string().contains("CREATE TABLEX broken"));

        let err = adapter.exec("CREATE TABLEX broken (id);", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            MigrationError::Statement { ref statement, .. } if statement == "CREATE TABLEX broken (id);"
        ));
    }

    #[tokio::test]
    async fn test_transaction_commits() {
        let adapter = memory_adapter().await;
        adapter
            .transaction(Box::new(|tx: &mut dyn Executor| {
                tx.exec_batch("CREATE TABLE a (id INTEGER);")?;
                tx.exec("INSERT INTO a (id) VALUES (?1)", &[7i64.into()])?;
                Ok(())
            }))
            .await
            .unwrap();

        let row = adapter.get("SELECT id FROM a", &[]).await.unwrap().unwrap();
        assert_eq!(row["id"], JsonValue::from(7));
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let adapter = memory_adapter().await;
        let err = adapter
            .transaction(Box::new(|tx: &mut dyn Executor| {
                tx.exec_batch("CREATE TABLE a (id INTEGER);")?;
                tx.exec_batch("INSERT INTO missing VALUES (1);")
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Statement { .. }));

        let exists = adapter
            .get(
                "SELECT 1 AS found FROM sqlite_master WHERE type = 'table' AND name = 'a'",
                &[],
            )
            .await
            .unwrap();
        assert!(exists.is_none());
    }

    #[tokio::test]
    async fn test_ledger_round_trip() {
        let adapter = memory_adapter().await;
        adapter.ensure_migration_table().await.unwrap();
        adapter.ensure_migration_table().await.unwrap();

        adapter.record_migration("002-b").await.unwrap();
        adapter.record_migration("001-a").await.unwrap();

        let names: Vec<_> = adapter
            .get_executed_migrations()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["001-a", "002-b"]);

        adapter.remove_migration("001-a").await.unwrap();
        let executed = adapter.get_executed_migrations().await.unwrap();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].name, "002-b");
    }

    #[tokio::test]
    async fn test_recording_twice_is_rejected() {
        let adapter = memory_adapter().await;
        adapter.ensure_migration_table().await.unwrap();
        adapter.record_migration("001-a").await.unwrap();
        assert!(adapter.record_migration("001-a").await.is_err());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_across_connections() {
        let dir = TempDir::new().unwrap();
        let first = file_adapter(&dir).await;
        let second = file_adapter(&dir).await;
        first.ensure_migration_table().await.unwrap();
        second.ensure_migration_table().await.unwrap();

        assert!(first.lock_holder().await.unwrap().is_none());
        assert!(first.acquire_migration_lock().await.unwrap());
        assert!(!second.acquire_migration_lock().await.unwrap());
        assert!(!first.acquire_migration_lock().await.unwrap());

        let holder = second.lock_holder().await.unwrap().unwrap();
        assert_eq!(holder.locked_by.as_deref(), Some(first.instance_id()));
        assert!(holder.locked_at.is_some());

        first.release_migration_lock().await.unwrap();
        assert!(second.acquire_migration_lock().await.unwrap());
        second.release_migration_lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_custom_table_names() {
        let adapter = memory_adapter()
            .await
            .with_tables("schema_history", "schema_lock")
            .unwrap();
        adapter.ensure_migration_table().await.unwrap();
        adapter.record_migration("001-a").await.unwrap();

        let row = adapter
            .get("SELECT COUNT(*) AS n FROM schema_history", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["n"], JsonValue::from(1));
        assert!(adapter.acquire_migration_lock().await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_table_names_are_rejected() {
        for (ledger, lock) in [
            ("bad-name", "lock"),
            ("ledger", "lock; DROP TABLE x"),
            ("same", "same"),
        ] {
            let err = memory_adapter()
                .await
                .with_tables(ledger, lock)
                .unwrap_err();
            assert!(matches!(err, MigrationError::InvalidIdentifier(_)));
        }
    }

    #[tokio::test]
    async fn test_close() {
        let adapter = memory_adapter().await;
        adapter.close().await.unwrap();
        adapter.close().await.unwrap();

        let err = adapter.exec_batch("SELECT 1;").await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
