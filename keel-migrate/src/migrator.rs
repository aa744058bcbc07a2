//! Migration orchestration.
//!
//! The migrator has no persisted "current version": on every call it
//! recomputes the executed and pending sets from the adapter's ledger and the
//! source's resolved list.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::adapter::{Adapter, MigrationRecord};
use crate::context::MigrationContext;
use crate::error::{MigrateResult, MigrationError};
use crate::migration::{Migration, MigrationDirection};
use crate::source::MigrationSource;

/// How far `down` should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownTarget<'a> {
    /// Only the most recent migration.
    Last,
    /// Every migration down to and including this one.
    To(&'a str),
    /// Every executed migration.
    All,
}

/// Migration status information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Executed migrations, ordered by name.
    pub executed: Vec<MigrationRecord>,
    /// Pending migration names, in execution order.
    pub pending: Vec<String>,
}

impl MigrationStatus {
    /// Names of the executed migrations.
    pub fn executed_names(&self) -> Vec<&str> {
        self.executed.iter().map(|r| r.name.as_str()).collect()
    }

    /// Check if every known migration has been applied.
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get a summary of the status.
    pub fn summary(&self) -> String {
        format!(
            "{} executed, {} pending",
            self.executed.len(),
            self.pending.len()
        )
    }
}

/// Applies and reverts migrations from a source against an adapter.
pub struct Migrator<A: Adapter> {
    adapter: Arc<A>,
    source: Box<dyn MigrationSource>,
}

impl<A: Adapter> Migrator<A> {
    /// Create a new migrator.
    pub fn new(adapter: Arc<A>, source: impl MigrationSource + 'static) -> Self {
        Self {
            adapter,
            source: Box::new(source),
        }
    }

    /// Get the adapter.
    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    /// Resolve the source, sorted by name, rejecting duplicate names.
    async fn resolve(&self) -> MigrateResult<Vec<Arc<dyn Migration>>> {
        let mut migrations = self.source.resolve().await?;
        migrations.sort_by(|a, b| a.name().cmp(b.name()));

        if let Some(pair) = migrations.windows(2).find(|w| w[0].name() == w[1].name()) {
            return Err(MigrationError::Duplicate(pair[0].name().to_string()));
        }

        Ok(migrations)
    }

    /// Run `op` while holding the migration lock.
    ///
    /// `op` is not polled until the lock is held, and the lock is released on
    /// every path once it completes.
    async fn locked<T>(&self, op: impl Future<Output = MigrateResult<T>>) -> MigrateResult<T> {
        self.adapter.ensure_migration_table().await?;

        if !self.adapter.acquire_migration_lock().await? {
            let holder = self
                .adapter
                .lock_holder()
                .await
                .ok()
                .flatten()
                .and_then(|info| info.locked_by);
            warn!(holder = ?holder, "Migration lock is held by another instance");
            return Err(MigrationError::locked(holder));
        }
        debug!("Migration lock acquired");

        let result = op.await;
        let released = self.adapter.release_migration_lock().await;

        match (result, released) {
            (Ok(value), Ok(())) => {
                debug!("Migration lock released");
                Ok(value)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_error)) => {
                warn!(error = %release_error, "Failed to release migration lock");
                Err(e)
            }
        }
    }

    /// Apply every pending migration.
    ///
    /// Returns the names of the applied migrations, in order. Stops at the
    /// first failure; migrations applied before it stay recorded.
    pub async fn up(&self) -> MigrateResult<Vec<String>> {
        self.locked(self.apply_pending(None)).await
    }

    /// Apply pending migrations up to and including `name`.
    pub async fn up_to(&self, name: &str) -> MigrateResult<Vec<String>> {
        self.locked(self.apply_pending(Some(name))).await
    }

    /// Revert the most recently executed migration.
    pub async fn down(&self) -> MigrateResult<Vec<String>> {
        self.locked(self.revert(DownTarget::Last)).await
    }

    /// Revert executed migrations down to and including `name`.
    pub async fn down_to(&self, name: &str) -> MigrateResult<Vec<String>> {
        self.locked(self.revert(DownTarget::To(name))).await
    }

    /// Revert every executed migration, most recent first.
    pub async fn reset(&self) -> MigrateResult<Vec<String>> {
        self.locked(self.revert(DownTarget::All)).await
    }

    async fn apply_pending(&self, target: Option<&str>) -> MigrateResult<Vec<String>> {
        let migrations = self.resolve().await?;
        let known: HashSet<String> = migrations.iter().map(|m| m.name().to_string()).collect();
        let executed: HashSet<String> = self
            .adapter
            .get_executed_migrations()
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();

        let mut pending: Vec<_> = migrations
            .into_iter()
            .filter(|m| !executed.contains(m.name()))
            .collect();

        if let Some(target) = target {
            match pending.iter().position(|m| m.name() == target) {
                Some(index) => pending.truncate(index + 1),
                None if known.contains(target) => pending.clear(),
                None => return Err(MigrationError::NotFound(target.to_string())),
            }
        }

        debug!(count = pending.len(), target = ?target, "Planned pending migrations");

        let ctx = MigrationContext::new(&*self.adapter);
        let mut applied = Vec::with_capacity(pending.len());

        for migration in pending {
            let name = migration.name();
            let started = Instant::now();
            info!(migration = %name, "Applying migration");

            if let Err(e) = migration.up(&ctx).await {
                error!(migration = %name, error = %e, "Migration failed");
                return Err(MigrationError::failed(name, MigrationDirection::Up, e));
            }
            // The schema change is in place; a failure here leaves it unrecorded.
            if let Err(e) = self.adapter.record_migration(name).await {
                error!(migration = %name, error = %e, "Applied migration could not be recorded");
                return Err(MigrationError::failed(name, MigrationDirection::Up, e));
            }

            info!(
                migration = %name,
                duration_ms = started.elapsed().as_millis() as u64,
                "Applied migration"
            );
            applied.push(name.to_string());
        }

        Ok(applied)
    }

    async fn revert(&self, target: DownTarget<'_>) -> MigrateResult<Vec<String>> {
        let migrations = self.resolve().await?;
        let mut executed = self.adapter.get_executed_migrations().await?;
        executed.sort_by(|a, b| b.name.cmp(&a.name));

        match target {
            DownTarget::Last => executed.truncate(1),
            DownTarget::All => {}
            DownTarget::To(name) => match executed.iter().position(|r| r.name == name) {
                Some(index) => executed.truncate(index + 1),
                None if migrations.iter().any(|m| m.name() == name) => executed.clear(),
                None => return Err(MigrationError::NotFound(name.to_string())),
            },
        }

        // Every selected record needs its migration before anything is reverted.
        let selected = executed
            .iter()
            .map(|record| {
                migrations
                    .iter()
                    .find(|m| m.name() == record.name)
                    .cloned()
                    .ok_or_else(|| MigrationError::NotFound(record.name.clone()))
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        debug!(count = selected.len(), target = ?target, "Planned migrations to revert");

        let ctx = MigrationContext::new(&*self.adapter);
        let mut reverted = Vec::with_capacity(selected.len());

        for migration in selected {
            let name = migration.name();
            let started = Instant::now();
            info!(migration = %name, "Reverting migration");

            if let Err(e) = migration.down(&ctx).await {
                error!(migration = %name, error = %e, "Migration revert failed");
                return Err(MigrationError::failed(name, MigrationDirection::Down, e));
            }
            if let Err(e) = self.adapter.remove_migration(name).await {
                error!(migration = %name, error = %e, "Reverted migration is still recorded");
                return Err(MigrationError::failed(name, MigrationDirection::Down, e));
            }

            info!(
                migration = %name,
                duration_ms = started.elapsed().as_millis() as u64,
                "Reverted migration"
            );
            reverted.push(name.to_string());
        }

        Ok(reverted)
    }

    /// Executed migrations, ordered by name.
    pub async fn executed(&self) -> MigrateResult<Vec<MigrationRecord>> {
        self.adapter.ensure_migration_table().await?;
        self.adapter.get_executed_migrations().await
    }

    /// Names of the migrations that have not been applied, in execution order.
    pub async fn pending(&self) -> MigrateResult<Vec<String>> {
        Ok(self.status().await?.pending)
    }

    /// Get migration status.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let executed = self.executed().await?;
        let migrations = self.resolve().await?;

        let executed_names: HashSet<&str> = executed.iter().map(|r| r.name.as_str()).collect();
        let pending = migrations
            .iter()
            .filter(|m| !executed_names.contains(m.name()))
            .map(|m| m.name().to_string())
            .collect();

        Ok(MigrationStatus { executed, pending })
    }

    /// Check if any migration is waiting to be applied.
    pub async fn has_pending_migrations(&self) -> MigrateResult<bool> {
        Ok(!self.pending().await?.is_empty())
    }
}
