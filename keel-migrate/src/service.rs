//! Startup wiring for the embedding application.

use std::sync::Arc;

use tracing::info;

use crate::adapter::Adapter;
use crate::error::MigrateResult;
use crate::migrator::Migrator;
use crate::source::MigrationSource;

/// The adapter and migrator, built once at startup and passed around
/// explicitly.
pub struct Services<A: Adapter> {
    adapter: Arc<A>,
    migrator: Migrator<A>,
}

impl<A: Adapter> Services<A> {
    /// Wire a migrator to the adapter.
    pub fn new(adapter: A, source: impl MigrationSource + 'static) -> Self {
        let adapter = Arc::new(adapter);
        let migrator = Migrator::new(adapter.clone(), source);
        Self { adapter, migrator }
    }

    /// Bring the database schema up to date.
    ///
    /// Returns the names of the migrations applied by this call.
    pub async fn initialize(&self) -> MigrateResult<Vec<String>> {
        self.adapter.ensure_migration_table().await?;
        let applied = self.migrator.up().await?;
        info!(applied = applied.len(), "Database schema is up to date");
        Ok(applied)
    }

    /// The shared adapter.
    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    /// The migrator.
    pub fn migrator(&self) -> &Migrator<A> {
        &self.migrator
    }

    /// Close the adapter.
    pub async fn close(self) -> MigrateResult<()> {
        self.adapter.close().await
    }
}
