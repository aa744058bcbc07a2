//! CLI command implementations.

pub mod create;
pub mod migrate;
pub mod unlock;

use std::sync::Arc;

use keel_migrate::{Adapter, FilesystemSource, MigrateResult, Migrator};
use keel_sqlite::SqliteAdapter;
use tracing::warn;

use crate::cli::GlobalArgs;
use crate::config::Config;
use crate::error::CliResult;
use crate::output;

/// Open the configured database with the configured table names.
pub(crate) async fn open_adapter(config: &Config) -> CliResult<SqliteAdapter> {
    let sqlite = config.database.sqlite_config()?;
    let adapter = SqliteAdapter::open(sqlite).await?.with_tables(
        config.migrations.table_name.as_str(),
        config.migrations.lock_table_name.as_str(),
    )?;
    Ok(adapter)
}

/// A migrator over the project's migrations directory.
pub(crate) struct Project {
    pub config: Config,
    pub migrator: Migrator<SqliteAdapter>,
}

impl Project {
    /// Resolve configuration and open the database.
    pub async fn open(global: &GlobalArgs) -> CliResult<Self> {
        let config = Config::resolve(global)?;
        let adapter = open_adapter(&config).await?;
        let source = FilesystemSource::new(&config.migrations.directory);
        let migrator = Migrator::new(Arc::new(adapter), source);
        Ok(Self { config, migrator })
    }

    /// Print where this project reads from.
    pub fn describe(&self) {
        output::kv("Database", &self.config.database.path);
        output::kv(
            "Migrations",
            &self.config.migrations.directory.display().to_string(),
        );
        output::newline();
    }

    /// Close the database connection.
    pub async fn close(self) -> CliResult<()> {
        self.migrator.adapter().close().await?;
        Ok(())
    }

    /// Close the database connection and return the operation's outcome.
    pub async fn finish<T>(self, result: MigrateResult<T>) -> CliResult<T> {
        let closed = self.close().await;
        settle(result, closed)
    }
}

/// Combine an operation's outcome with the result of closing the database.
///
/// An operation error takes precedence over a failure to close.
fn settle<T>(result: MigrateResult<T>, closed: CliResult<()>) -> CliResult<T> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e.into()),
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "Failed to close the database after an error");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use keel_migrate::{MigrationDirection, MigrationError};
    use tempfile::TempDir;

    fn unit_failure() -> MigrationError {
        MigrationError::failed(
            "003-broken",
            MigrationDirection::Up,
            MigrationError::statement("CREATE TABLEX nope", "syntax error"),
        )
    }

    fn close_failure() -> CliResult<()> {
        Err(MigrationError::adapter("disk I/O error").into())
    }

    #[test]
    fn test_settle_keeps_migration_error_when_close_fails() {
        match settle::<()>(Err(unit_failure()), close_failure()).unwrap_err() {
            CliError::Migration(e) => assert_eq!(e.migration_name(), Some("003-broken")),
            other => panic!("expected a migration error, got {other:?}"),
        }
    }

    #[test]
    fn test_settle_reports_close_failure_after_success() {
        assert!(matches!(
            settle(Ok(()), close_failure()),
            Err(CliError::Migration(MigrationError::Adapter { .. }))
        ));
        assert_eq!(settle(Ok(3), Ok(())).unwrap(), 3);
        assert!(matches!(
            settle::<()>(Err(unit_failure()), Ok(())),
            Err(CliError::Migration(_))
        ));
    }

    #[tokio::test]
    async fn test_finish_closes_database() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("keel.db").display().to_string();
        config.migrations.directory = dir.path().join("migrations");

        let adapter = Arc::new(open_adapter(&config).await.unwrap());
        let project = Project {
            migrator: Migrator::new(adapter.clone(), FilesystemSource::new(&config.migrations.directory)),
            config,
        };

        assert_eq!(project.finish(Ok(3)).await.unwrap(), 3);
        assert!(adapter.exec_batch("SELECT 1;").await.is_err());
    }
}
