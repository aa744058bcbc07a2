//! SQLite adapter for the Keel migration engine.
//!
//! This crate implements [`keel_migrate::Adapter`] on top of `tokio-rusqlite`,
//! running every statement on the connection's background thread.
//!
//! # Features
//!
//! - In-memory and file-based databases
//! - Transactions that commit or roll back as a unit
//! - Executed-migrations ledger and single-row migration lock, both with
//!   configurable table names
//!
//! # Example
//!
//! ```rust,ignore
//! use keel_sqlite::{SqliteAdapter, SqliteConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SqliteConfig::from_url("sqlite://./app.db")?;
//!     let adapter = SqliteAdapter::open(config)
//!         .await?
//!         .with_tables("schema_migrations", "schema_migrations_lock")?;
//!
//!     // Hand the adapter to a `keel_migrate::Migrator`...
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod types;

pub use adapter::{DEFAULT_LOCK_TABLE, DEFAULT_MIGRATIONS_TABLE, SqliteAdapter, SqliteExecutor};
pub use config::{DEFAULT_BUSY_TIMEOUT_MS, DatabasePath, JournalMode, SqliteConfig, SynchronousMode};
pub use error::{SqliteError, SqliteResult};
