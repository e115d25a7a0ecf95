use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    storylight::logging::init().context("init logging")?;

    let cli = storylight::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        storylight::cli::Command::Extract(args) => {
            storylight::commands::extract(args).context("extract")?;
        }
        storylight::cli::Command::Read(args) => {
            storylight::commands::read(args).await.context("read")?;
        }
        storylight::cli::Command::Lookup(args) => {
            storylight::commands::lookup(args).await.context("lookup")?;
        }
    }

    Ok(())
}
