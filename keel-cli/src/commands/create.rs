//! `keel create` - scaffold a new migration file.

use keel_migrate::FilesystemSource;

use crate::cli::{CreateArgs, GlobalArgs};
use crate::config::Config;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run `keel create`
pub async fn run(global: &GlobalArgs, args: CreateArgs) -> CliResult<()> {
    let config = Config::resolve(global)?;
    let source = FilesystemSource::new(&config.migrations.directory);

    let path = source.create(&args.description()).await?;

    success(&format!("Created {}", path.display()));
    output::info("Write the change under `-- migrate:up` and its inverse under `-- migrate:down`.");
    Ok(())
}
