//! Migration units.
//!
//! A migration is a named change with an `up` and a `down` procedure. The name
//! is its only identity, and the sort order of names is the execution order.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::context::MigrationContext;
use crate::error::{MigrateResult, MigrationError};

/// Future returned by closure-based migrations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Marker that starts the up section of a SQL script.
pub const UP_MARKER: &str = "-- migrate:up";
/// Marker that starts the down section of a SQL script.
pub const DOWN_MARKER: &str = "-- migrate:down";
/// Directive that disables the implicit transaction around a SQL script.
pub const NO_TRANSACTION_MARKER: &str = "-- migrate:no-transaction";

/// Direction of migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationDirection {
    /// Apply the migration (up).
    Up,
    /// Reverse the migration (down).
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// A database migration.
///
/// Implementations must not hold resources between `up` and `down`, and
/// should guard DDL with existence checks so that a retried `up` is safe.
#[async_trait::async_trait]
pub trait Migration: Send + Sync {
    /// Unique, sortable name.
    fn name(&self) -> &str;

    /// Apply the migration.
    async fn up(&self, ctx: &MigrationContext<'_>) -> MigrateResult<()>;

    /// Reverse the migration.
    async fn down(&self, ctx: &MigrationContext<'_>) -> MigrateResult<()>;

    /// Whether `down` does anything.
    fn is_reversible(&self) -> bool {
        true
    }
}

impl fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration").field("name", &self.name()).finish()
    }
}

/// A migration written as SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    name: String,
    up_sql: String,
    down_sql: Option<String>,
    transactional: bool,
}

impl SqlMigration {
    /// Create a new migration from its up SQL.
    pub fn new(name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up_sql: up_sql.into().trim().to_string(),
            down_sql: None,
            transactional: true,
        }
    }

    /// Set the down SQL.
    pub fn with_down_sql(mut self, sql: impl Into<String>) -> Self {
        let sql = sql.into().trim().to_string();
        self.down_sql = (!sql.is_empty()).then_some(sql);
        self
    }

    /// Run the scripts outside of a transaction.
    pub fn without_transaction(mut self) -> Self {
        self.transactional = false;
        self
    }

    /// Parse a single script split by `-- migrate:up` / `-- migrate:down` markers.
    ///
    /// Text before the first marker belongs to the up section. A
    /// `-- migrate:no-transaction` line anywhere disables the transaction.
    pub fn parse(name: impl Into<String>, script: &str) -> MigrateResult<Self> {
        let name = name.into();
        let mut up = String::new();
        let mut down = String::new();
        let mut in_down = false;
        let mut seen_up = false;
        let mut seen_down = false;
        let mut transactional = true;

        for line in script.lines() {
            let marker = line.trim().to_ascii_lowercase();
            if marker == UP_MARKER {
                if seen_up || seen_down {
                    return Err(MigrationError::invalid_migration(format!(
                        "{name}: unexpected '{UP_MARKER}'"
                    )));
                }
                seen_up = true;
                continue;
            }
            if marker == DOWN_MARKER {
                if seen_down {
                    return Err(MigrationError::invalid_migration(format!(
                        "{name}: duplicate '{DOWN_MARKER}'"
                    )));
                }
                seen_down = true;
                in_down = true;
                continue;
            }
            if marker == NO_TRANSACTION_MARKER {
                transactional = false;
                continue;
            }

            let section = if in_down { &mut down } else { &mut up };
            section.push_str(line);
            section.push('\n');
        }

        if up.trim().is_empty() {
            return Err(MigrationError::invalid_migration(format!(
                "{name}: empty up section"
            )));
        }

        let mut migration = Self::new(name, up).with_down_sql(down);
        migration.transactional = transactional;
        Ok(migration)
    }

    /// The up SQL.
    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    /// The down SQL, if any.
    pub fn down_sql(&self) -> Option<&str> {
        self.down_sql.as_deref()
    }

    /// Whether the scripts run inside a transaction.
    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    async fn execute(&self, ctx: &MigrationContext<'_>, sql: &str) -> MigrateResult<()> {
        debug!(migration = %self.name, transactional = self.transactional, "Executing migration script");
        if self.transactional {
            let sql = sql.to_string();
            ctx.transaction(move |tx| tx.exec_batch(&sql)).await
        } else {
            ctx.adapter().exec_batch(sql).await
        }
    }
}

#[async_trait::async_trait]
impl Migration for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, ctx: &MigrationContext<'_>) -> MigrateResult<()> {
        self.execute(ctx, &self.up_sql).await
    }

    async fn down(&self, ctx: &MigrationContext<'_>) -> MigrateResult<()> {
        match &self.down_sql {
            Some(sql) => self.execute(ctx, sql).await,
            None => Err(MigrationError::Irreversible(self.name.clone())),
        }
    }

    fn is_reversible(&self) -> bool {
        self.down_sql.is_some()
    }
}

type MigrationFn =
    Box<dyn for<'a> Fn(&'a MigrationContext<'a>) -> BoxFuture<'a, MigrateResult<()>> + Send + Sync>;

/// A migration written as Rust code.
///
/// ```rust,ignore
/// let migration = FnMigration::new(
///     "003-add-session-title",
///     |ctx| Box::pin(async move {
///         if !ctx.column_exists("sessions", "title").await? {
///             ctx.adapter().exec("ALTER TABLE sessions ADD COLUMN title TEXT", &[]).await?;
///         }
///         Ok(())
///     }),
///     |ctx| Box::pin(async move {
///         ctx.adapter().exec("ALTER TABLE sessions DROP COLUMN title", &[]).await
///     }),
/// );
/// ```
pub struct FnMigration {
    name: String,
    up: MigrationFn,
    down: MigrationFn,
}

impl FnMigration {
    /// Create a migration from two async closures.
    pub fn new<U, D>(name: impl Into<String>, up: U, down: D) -> Self
    where
        U: for<'a> Fn(&'a MigrationContext<'a>) -> BoxFuture<'a, MigrateResult<()>>
            + Send
            + Sync
            + 'static,
        D: for<'a> Fn(&'a MigrationContext<'a>) -> BoxFuture<'a, MigrateResult<()>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            up: Box::new(up),
            down: Box::new(down),
        }
    }
}

impl fmt::Debug for FnMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMigration")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Migration for FnMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, ctx: &MigrationContext<'_>) -> MigrateResult<()> {
        (self.up)(ctx).await
    }

    async fn down(&self, ctx: &MigrationContext<'_>) -> MigrateResult<()> {
        (self.down)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creation() {
        let migration = SqlMigration::new("001-create-users", "CREATE TABLE users (id INT);\n");

        assert_eq!(migration.name(), "001-create-users");
        assert_eq!(migration.up_sql(), "CREATE TABLE users (id INT);");
        assert!(migration.is_transactional());
        assert!(!migration.is_reversible());
    }

    #[test]
    fn test_migration_with_down() {
        let migration = SqlMigration::new("001-create-users", "CREATE TABLE users (id INT);")
            .with_down_sql("DROP TABLE users;");

        assert!(migration.is_reversible());
        assert_eq!(migration.down_sql(), Some("DROP TABLE users;"));
    }

    #[test]
    fn test_blank_down_is_irreversible() {
        let migration = SqlMigration::new("001-a", "SELECT 1;").with_down_sql("  \n");
        assert!(!migration.is_reversible());
    }

    #[test]
    fn test_parse_sections() {
        let script = "\
-- migrate:up
CREATE TABLE sessions (id TEXT PRIMARY KEY);

-- migrate:down
DROP TABLE sessions;
";
        let migration = SqlMigration::parse("001-sessions", script).unwrap();
        assert_eq!(
            migration.up_sql(),
            "CREATE TABLE sessions (id TEXT PRIMARY KEY);"
        );
        assert_eq!(migration.down_sql(), Some("DROP TABLE sessions;"));
        assert!(migration.is_transactional());
    }

    #[test]
    fn test_parse_without_markers_is_up_only() {
        let migration = SqlMigration::parse("001-a", "CREATE TABLE a (id INT);").unwrap();
        assert_eq!(migration.up_sql(), "CREATE TABLE a (id INT);");
        assert!(!migration.is_reversible());
    }

    #[test]
    fn test_parse_no_transaction() {
        let script = "-- migrate:no-transaction\n-- migrate:up\nVACUUM;\n";
        let migration = SqlMigration::parse("002-vacuum", script).unwrap();
        assert!(!migration.is_transactional());
        assert_eq!(migration.up_sql(), "VACUUM;");
    }

    #[test]
    fn test_parse_markers_are_case_insensitive() {
        let script = "-- MIGRATE:UP\nSELECT 1;\n-- Migrate:Down\nSELECT 2;\n";
        let migration = SqlMigration::parse("001-a", script).unwrap();
        assert_eq!(migration.down_sql(), Some("SELECT 2;"));
    }

    #[test]
    fn test_parse_rejects_empty_up() {
        let err = SqlMigration::parse("001-a", "-- migrate:up\n\n-- migrate:down\nDROP TABLE a;")
            .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidMigration(_)));
    }

    #[test]
    fn test_parse_rejects_duplicate_markers() {
        let script = "-- migrate:up\nSELECT 1;\n-- migrate:down\nSELECT 2;\n-- migrate:down\n";
        assert!(SqlMigration::parse("001-a", script).is_err());

        let script = "-- migrate:up\nSELECT 1;\n-- migrate:down\nSELECT 2;\n-- migrate:up\n";
        assert!(SqlMigration::parse("001-a", script).is_err());
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(MigrationDirection::Up.to_string(), "up");
        assert_eq!(MigrationDirection::Down.to_string(), "down");
    }
}
