use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod env;

use cli::{Cli, Commands};
use commands::{cmd_check, cmd_init, cmd_sync, cmd_tables};
use config::load_config;
use env::load_dotenv;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("swo=info".parse()?),
        )
        .init();

    if let Commands::Init = cli.command {
        return cmd_init(&cli.config);
    }

    load_dotenv(cli.env.as_deref())?;
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Check => cmd_check(&config).await,
        Commands::Tables => cmd_tables(&config).await,
        Commands::Sync { json } => cmd_sync(&config, json).await,
    }
}
