//! `keel unlock` - manual recovery of a stale migration lock.

use keel_migrate::Adapter;
use tracing::warn;

use crate::cli::{ForceArgs, GlobalArgs};
use crate::commands::open_adapter;
use crate::config::Config;
use crate::error::{CliError, CliResult};
use crate::output::{self, success};

/// Run `keel unlock`
///
/// The lock never expires on its own. Only use this when the process named
/// as the holder is known to be gone.
pub async fn run(global: &GlobalArgs, args: ForceArgs) -> CliResult<()> {
    if !args.force {
        return Err(CliError::Command(
            "unlock clears the lock even if a migration is running; re-run with --force to confirm"
                .to_string(),
        ));
    }

    output::header("Unlock");

    let config = Config::resolve(global)?;
    let adapter = open_adapter(&config).await?;
    adapter.ensure_migration_table().await?;

    let Some(holder) = adapter.lock_holder().await? else {
        adapter.close().await?;
        output::info("Migration lock is not held.");
        return Ok(());
    };

    let holder_id = holder.locked_by.as_deref().unwrap_or("unknown");
    if let Some(locked_at) = holder.locked_at {
        output::kv("Locked at", &locked_at.to_rfc3339());
    }
    output::kv("Locked by", holder_id);
    output::newline();

    warn!(holder = %holder_id, "Force-releasing migration lock");
    adapter.release_migration_lock().await?;
    adapter.close().await?;

    success("Migration lock released");
    Ok(())
}
