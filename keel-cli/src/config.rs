//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use keel_sqlite::{DEFAULT_LOCK_TABLE, DEFAULT_MIGRATIONS_TABLE, SqliteConfig};

use crate::cli::GlobalArgs;
use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "keel.toml";

/// Default database file (relative to project root)
pub const DATABASE_FILE: &str = "keel.db";

/// Default migrations directory (relative to project root)
pub const MIGRATIONS_DIR: &str = "migrations";

/// Keel CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Migration configuration
    pub migrations: MigrationConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the effective configuration for a command.
    ///
    /// An explicit `--config` file must exist; the default `keel.toml` is
    /// optional. Command-line flags override file values.
    pub fn resolve(args: &GlobalArgs) -> CliResult<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None if Path::new(CONFIG_FILE_NAME).exists() => Self::load(Path::new(CONFIG_FILE_NAME))?,
            None => Self::default(),
        };

        if let Some(database) = &args.database {
            config.database.path = database.clone();
        }
        if let Some(migrations) = &args.migrations {
            config.migrations.directory = migrations.clone();
        }

        Ok(config)
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite database file or `sqlite:` URL
    pub path: String,

    /// How long to wait on a locked database file, in milliseconds.
    /// Overrides a `busy_timeout` option in the URL.
    pub busy_timeout_ms: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DATABASE_FILE.to_string(),
            busy_timeout_ms: None,
        }
    }
}

impl DatabaseConfig {
    /// Build the SQLite connection settings.
    pub fn sqlite_config(&self) -> CliResult<SqliteConfig> {
        let config = SqliteConfig::from_url(&self.path)?;
        Ok(match self.busy_timeout_ms {
            Some(ms) => config.busy_timeout(ms),
            None => config,
        })
    }
}

/// Migration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Directory for migration files
    pub directory: PathBuf,

    /// Executed-migrations ledger table name
    pub table_name: String,

    /// Migration lock table name
    pub lock_table_name: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(MIGRATIONS_DIR),
            table_name: DEFAULT_MIGRATIONS_TABLE.to_string(),
            lock_table_name: DEFAULT_LOCK_TABLE.to_string(),
        }
    }
}
