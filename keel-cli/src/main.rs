//! Keel CLI - apply and revert schema migrations.

use clap::Parser;
use miette::Diagnostic;

use keel_cli::cli::{Cli, Command};
use keel_cli::commands;
use keel_cli::error::CliResult;
use keel_cli::{logging, output};

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        if let Some(help) = e.help() {
            output::dim(&help.to_string());
        }
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Up(args) => commands::migrate::up(&cli.global, args).await,
        Command::Down(args) => commands::migrate::down(&cli.global, args).await,
        Command::Status(args) => commands::migrate::status(&cli.global, args).await,
        Command::Pending => commands::migrate::pending(&cli.global).await,
        Command::Reset(args) => commands::migrate::reset(&cli.global, args).await,
        Command::Unlock(args) => commands::unlock::run(&cli.global, args).await,
        Command::Create(args) => commands::create::run(&cli.global, args).await,
    }
}
