//! Migration sources.
//!
//! A source resolves the ordered list of available migrations. The
//! [`FilesystemSource`] scans a directory on every call and is meant for
//! development; the [`EmbeddedSource`] returns a compiled-in list and does no
//! I/O, for packaged builds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{MigrateResult, MigrationError};
use crate::migration::{DOWN_MARKER, Migration, SqlMigration, UP_MARKER};

/// Minimum width of the zero-padded sequence in generated file names.
pub const SEQUENCE_WIDTH: usize = 3;

/// Resolves the ordered set of migrations.
#[async_trait::async_trait]
pub trait MigrationSource: Send + Sync {
    /// All available migrations, sorted by name.
    async fn resolve(&self) -> MigrateResult<Vec<Arc<dyn Migration>>>;
}

/// Sort migrations by name.
fn sort_by_name(migrations: &mut [Arc<dyn Migration>]) {
    migrations.sort_by(|a, b| a.name().cmp(b.name()));
}

/// Migrations discovered in a directory.
///
/// Two layouts are recognised:
///
/// ```text
/// migrations/
/// ├── 001-create-sessions.sql     # single script with -- migrate:up / -- migrate:down
/// └── 002-add-projects/
///     ├── up.sql
///     └── down.sql                # optional
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemSource {
    migrations_dir: PathBuf,
}

impl FilesystemSource {
    /// Create a new source over the given directory.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Ensure the migrations directory exists.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir).await?;
        Ok(())
    }

    /// Read a migration from a directory holding `up.sql` and `down.sql`.
    async fn read_migration_dir(&self, name: &str, path: &Path) -> MigrateResult<SqlMigration> {
        let up_path = path.join("up.sql");
        let down_path = path.join("down.sql");

        if !tokio::fs::try_exists(&up_path).await? {
            return Err(MigrationError::invalid_migration(format!(
                "missing up.sql in {}",
                path.display()
            )));
        }

        let mut migration = SqlMigration::parse(name, &tokio::fs::read_to_string(&up_path).await?)?;
        if tokio::fs::try_exists(&down_path).await? {
            migration = migration.with_down_sql(tokio::fs::read_to_string(&down_path).await?);
        }

        Ok(migration)
    }

    /// Read a single-file migration.
    async fn read_migration_file(&self, name: &str, path: &Path) -> MigrateResult<SqlMigration> {
        let content = tokio::fs::read_to_string(path).await?;
        SqlMigration::parse(name, &content)
    }

    /// Next free sequence number.
    async fn next_sequence(&self) -> MigrateResult<(u64, usize)> {
        let mut highest = 0;
        let mut width = SEQUENCE_WIDTH;

        if tokio::fs::try_exists(&self.migrations_dir).await? {
            let mut entries = tokio::fs::read_dir(&self.migrations_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                if let Some((sequence, _)) = split_sequence(file_name) {
                    width = width.max(sequence.len());
                    if let Ok(n) = sequence.parse::<u64>() {
                        highest = highest.max(n);
                    }
                }
            }
        }

        Ok((highest + 1, width))
    }

    /// Write a new, empty migration script with the next sequence number.
    pub async fn create(&self, description: &str) -> MigrateResult<PathBuf> {
        let slug = slugify(description);
        if slug.is_empty() {
            return Err(MigrationError::invalid_migration(format!(
                "cannot derive a file name from '{description}'"
            )));
        }

        self.ensure_dir().await?;

        let (sequence, width) = self.next_sequence().await?;
        let file_name = format!("{sequence:0width$}-{slug}.sql");
        let path = self.migrations_dir.join(&file_name);

        let template = format!("{UP_MARKER}\n\n\n{DOWN_MARKER}\n\n");
        tokio::fs::write(&path, template).await?;

        info!(path = %path.display(), "Created migration");
        Ok(path)
    }
}

#[async_trait::async_trait]
impl MigrationSource for FilesystemSource {
    async fn resolve(&self) -> MigrateResult<Vec<Arc<dyn Migration>>> {
        let mut migrations: Vec<Arc<dyn Migration>> = Vec::new();

        if !tokio::fs::try_exists(&self.migrations_dir).await? {
            debug!(dir = %self.migrations_dir.display(), "Migrations directory does not exist");
            return Ok(migrations);
        }

        let mut entries = tokio::fs::read_dir(&self.migrations_dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push((entry.path(), entry.file_type().await?.is_dir()));
        }
        paths.sort();

        for (path, is_dir) in paths {
            let Some(name) = migration_name(&path, is_dir) else {
                debug!(path = %path.display(), "Skipping non-migration entry");
                continue;
            };

            let migration = if is_dir {
                self.read_migration_dir(&name, &path).await?
            } else {
                self.read_migration_file(&name, &path).await?
            };
            migrations.push(Arc::new(migration));
        }

        sort_by_name(&mut migrations);
        debug!(count = migrations.len(), "Resolved filesystem migrations");
        Ok(migrations)
    }
}

/// Migrations compiled into the binary.
///
/// ```rust,ignore
/// let source = EmbeddedSource::from_sql([
///     ("001-create-sessions", include_str!("../migrations/001-create-sessions.sql")),
///     ("002-add-projects", include_str!("../migrations/002-add-projects.sql")),
/// ])?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedSource {
    migrations: Vec<Arc<dyn Migration>>,
}

impl EmbeddedSource {
    /// Create a source from an explicit list.
    pub fn new(migrations: Vec<Arc<dyn Migration>>) -> Self {
        let mut migrations = migrations;
        sort_by_name(&mut migrations);
        Self { migrations }
    }

    /// Create a source from `(name, script)` pairs.
    pub fn from_sql<I, N, S>(scripts: I) -> MigrateResult<Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        let migrations = scripts
            .into_iter()
            .map(|(name, script)| {
                SqlMigration::parse(name, script.as_ref())
                    .map(|m| Arc::new(m) as Arc<dyn Migration>)
            })
            .collect::<MigrateResult<Vec<_>>>()?;
        Ok(Self::new(migrations))
    }

    /// Add a migration.
    pub fn with(mut self, migration: impl Migration + 'static) -> Self {
        self.migrations.push(Arc::new(migration));
        sort_by_name(&mut self.migrations);
        self
    }

    /// Number of embedded migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[async_trait::async_trait]
impl MigrationSource for EmbeddedSource {
    async fn resolve(&self) -> MigrateResult<Vec<Arc<dyn Migration>>> {
        Ok(self.migrations.clone())
    }
}

/// Split `NNN-rest` / `NNN_rest` into its numeric prefix and the rest.
fn split_sequence(name: &str) -> Option<(&str, &str)> {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let (sequence, rest) = name.split_at(digits);
    let rest = rest.strip_prefix('-').or_else(|| rest.strip_prefix('_'))?;
    (!rest.is_empty()).then_some((sequence, rest))
}

/// Migration name for a directory entry, if it follows the naming convention.
fn migration_name(path: &Path, is_dir: bool) -> Option<String> {
    let name = if is_dir {
        path.file_name()?.to_str()?
    } else {
        if path.extension()?.to_str()? != "sql" {
            return None;
        }
        path.file_stem()?.to_str()?
    };

    split_sequence(name).map(|_| name.to_string())
}

/// Turn a free-form description into a file name slug.
fn slugify(description: &str) -> String {
    let mut slug = String::with_capacity(description.len());
    for c in description.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
