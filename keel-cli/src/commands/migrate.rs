//! `keel up`, `down`, `status`, `pending` and `reset`.

use keel_migrate::MigrationStatus;

use crate::cli::{DownArgs, ForceArgs, GlobalArgs, StatusArgs, UpArgs};
use crate::commands::Project;
use crate::error::{CliError, CliResult};
use crate::output::{self, success};

/// Run `keel up` - apply pending migrations
pub async fn up(global: &GlobalArgs, args: UpArgs) -> CliResult<()> {
    output::header("Migrate Up");

    let project = Project::open(global).await?;
    project.describe();

    let result = match &args.to {
        Some(target) => project.migrator.up_to(target).await,
        None => project.migrator.up().await,
    };
    let applied = project.finish(result).await?;

    if applied.is_empty() {
        output::info("No pending migrations to apply.");
        return Ok(());
    }

    for name in &applied {
        output::list_item(&output::style_applied(name));
    }
    output::newline();
    success(&format!("Applied {} migration(s)", applied.len()));

    Ok(())
}

/// Run `keel down` - revert executed migrations
pub async fn down(global: &GlobalArgs, args: DownArgs) -> CliResult<()> {
    output::header("Migrate Down");

    let project = Project::open(global).await?;
    project.describe();

    let result = match &args.to {
        Some(target) => project.migrator.down_to(target).await,
        None => project.migrator.down().await,
    };
    let reverted = project.finish(result).await?;

    print_reverted(&reverted);
    Ok(())
}

/// Run `keel status` - show executed and pending migrations
pub async fn status(global: &GlobalArgs, args: StatusArgs) -> CliResult<()> {
    let project = Project::open(global).await?;
    let result = project.migrator.status().await;

    if args.json {
        let status = project.finish(result).await?;
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| CliError::Command(format!("cannot encode status: {e}")))?;
        println!("{json}");
        return Ok(());
    }

    output::header("Migration Status");
    project.describe();
    print_status(&project.finish(result).await?);

    Ok(())
}

fn print_status(status: &MigrationStatus) {
    output::section("Executed");
    if status.executed.is_empty() {
        output::list_item("(none)");
    }
    for record in &status.executed {
        output::list_item(&format!(
            "{}  {}",
            output::style_applied(&record.name),
            record.executed_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    output::newline();

    output::section("Pending");
    if status.pending.is_empty() {
        output::list_item("(none)");
    }
    for name in &status.pending {
        output::list_item(&output::style_pending(name));
    }
    output::newline();

    if status.is_up_to_date() {
        success(&status.summary());
    } else {
        output::warn(&status.summary());
    }
}

/// Run `keel pending` - list pending migration names, one per line
pub async fn pending(global: &GlobalArgs) -> CliResult<()> {
    let project = Project::open(global).await?;
    let result = project.migrator.pending().await;

    for name in project.finish(result).await? {
        println!("{name}");
    }
    Ok(())
}

/// Run `keel reset` - revert every executed migration
pub async fn reset(global: &GlobalArgs, args: ForceArgs) -> CliResult<()> {
    if !args.force {
        return Err(CliError::Command(
            "reset reverts every executed migration; re-run with --force to confirm".to_string(),
        ));
    }

    output::header("Migrate Reset");

    let project = Project::open(global).await?;
    project.describe();

    let result = project.migrator.reset().await;
    let reverted = project.finish(result).await?;

    print_reverted(&reverted);
    Ok(())
}

fn print_reverted(reverted: &[String]) {
    if reverted.is_empty() {
        output::info("No executed migrations to revert.");
        return;
    }

    for name in reverted {
        output::list_item(&output::style_pending(name));
    }
    output::newline();
    success(&format!("Reverted {} migration(s)", reverted.len()));
}
