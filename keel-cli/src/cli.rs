//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Keel - ordered, reversible schema migrations for SQLite
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(version)]
#[command(about = "Keel - schema migrations for SQLite", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to the configuration file (defaults to ./keel.toml when present)
    #[arg(long, global = true, env = "KEEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file or `sqlite:` URL, overriding the configuration file
    #[arg(long, global = true, env = "KEEL_DATABASE")]
    pub database: Option<String>,

    /// Migrations directory, overriding the configuration file
    #[arg(long, global = true)]
    pub migrations: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending migrations
    Up(UpArgs),

    /// Revert executed migrations (the most recent one by default)
    Down(DownArgs),

    /// Show executed and pending migrations
    Status(StatusArgs),

    /// List pending migrations
    Pending,

    /// Revert every executed migration
    Reset(ForceArgs),

    /// Clear a migration lock left behind by a crashed process
    Unlock(ForceArgs),

    /// Create a new migration file
    Create(CreateArgs),
}

/// Arguments for the `up` command
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Stop after applying this migration
    #[arg(long, value_name = "NAME")]
    pub to: Option<String>,
}

/// Arguments for the `down` command
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Revert down to and including this migration
    #[arg(long, value_name = "NAME")]
    pub to: Option<String>,
}

/// Arguments for the `status` command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}

/// Confirmation flag for destructive commands
#[derive(Args, Debug)]
pub struct ForceArgs {
    /// Confirm the operation
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the `create` command
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Short description used in the file name, e.g. "add users table"
    #[arg(required = true, num_args = 1..)]
    pub description: Vec<String>,
}

impl CreateArgs {
    /// The description words joined with spaces.
    pub fn description(&self) -> String {
        self.description.join(" ")
    }
}
