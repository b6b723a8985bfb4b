use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use flipbook::cli::{Cli, Command};
use flipbook::client::ApiClient;
use flipbook::commands;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    flipbook::logging::init(flipbook::logging::CLI_DEFAULT_FILTER).context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let client = ApiClient::new(&cli.server).context("build api client")?;
    match cli.command {
        Command::Books { command } => commands::run_books(&client, command)
            .await
            .context("books")?,
        Command::Pages { command } => commands::run_pages(&client, command)
            .await
            .context("pages")?,
        Command::Interactive { command } => commands::run_interactive(&client, command)
            .await
            .context("interactive")?,
    }

    Ok(())
}
