//! # keel-migrate
//!
//! Schema migration engine for an embedded relational datastore.
//!
//! This crate provides:
//! - An [`Adapter`] contract for the datastore, including the executed
//!   migrations ledger and a cross-process migration lock
//! - [`Migration`] units with `up` and `down` procedures, written as SQL
//!   ([`SqlMigration`]) or Rust ([`FnMigration`])
//! - [`MigrationSource`]s that discover migrations on disk
//!   ([`FilesystemSource`]) or ship them inside the binary ([`EmbeddedSource`])
//! - A [`Migrator`] exposing `up`, `down`, `reset` and `status`
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │  Migrator    │────▶│ Adapter lock   │────▶│ Source::resolve  │
//! └──────────────┘     └────────────────┘     └──────────────────┘
//!                                                      │
//!                                                      ▼
//!                      ┌────────────────┐     ┌──────────────────┐
//!                      │ Adapter unlock │◀────│ unit.up / down   │
//!                      └────────────────┘     │ + ledger record  │
//!                                             └──────────────────┘
//! ```
//!
//! There is no stored version pointer: each call compares the ledger with the
//! resolved migrations. Names sort in execution order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use keel_migrate::{FilesystemSource, Services};
//! use keel_sqlite::{SqliteAdapter, SqliteConfig};
//!
//! async fn startup() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = SqliteAdapter::open(SqliteConfig::file("app.db")).await?;
//!     let services = Services::new(adapter, FilesystemSource::new("./migrations"));
//!
//!     let applied = services.initialize().await?;
//!     println!("Applied {} migrations", applied.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Stale locks
//!
//! A process killed mid-migration leaves the lock row set. The lock never
//! expires on its own; an operator clears it with
//! [`Adapter::release_migration_lock`] (`keel unlock --force`).

pub mod adapter;
pub mod context;
pub mod error;
pub mod migration;
pub mod migrator;
pub mod service;
pub mod source;

// Re-exports
pub use adapter::{
    Adapter, Executor, LockInfo, MigrationRecord, Row, RunResult, SqlValue, TransactionWork,
};
pub use context::{MigrationContext, validate_identifier};
pub use error::{BoxError, MigrateResult, MigrationError};
pub use migration::{BoxFuture, FnMigration, Migration, MigrationDirection, SqlMigration};
pub use migrator::{MigrationStatus, Migrator};
pub use service::Services;
pub use source::{EmbeddedSource, FilesystemSource, MigrationSource};
