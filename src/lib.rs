//! # Keel
//!
//! Ordered, reversible schema migrations for embedded SQLite databases.
//!
//! Keel provides:
//! - A migration engine that applies and reverts named units in order
//!   ([`migrate`])
//! - An executed-migrations ledger and a cross-process migration lock, both
//!   stored in the database itself
//! - A SQLite adapter built on `tokio-rusqlite` ([`sqlite`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keel::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), MigrationError> {
//!     let adapter = SqliteAdapter::open(SqliteConfig::file("app.db")).await?;
//!     let services = Services::new(adapter, FilesystemSource::new("migrations"));
//!
//!     for name in services.initialize().await? {
//!         println!("applied {name}");
//!     }
//!
//!     services.close().await
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The migration engine: adapter contract, migrations, sources and migrator.
pub mod migrate {
    pub use keel_migrate::*;
}

/// The SQLite adapter.
pub mod sqlite {
    pub use keel_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Adapter, EmbeddedSource, FilesystemSource, FnMigration, Migration, MigrationContext,
        MigrationError, MigrationSource, MigrationStatus, Migrator, Services, SqlMigration,
    };
    pub use crate::sqlite::{SqliteAdapter, SqliteConfig};
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationError, Migrator};
pub use sqlite::SqliteAdapter;
