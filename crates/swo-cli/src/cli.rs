use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "swo")]
#[command(about = "Copy a live Postgres database into a new instance from one consistent snapshot")]
#[command(version)]
pub struct Cli {
    /// Environment to load (loads .env.{ENV} instead of .env)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Path to swo.toml config file
    #[arg(short, long, global = true, default_value = "swo.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a starter swo.toml and .env.example in the current directory
    Init,

    /// Connect to both databases and verify the selected tables exist on the destination
    Check,

    /// List the tables that would be synced or skipped
    Tables,

    /// Copy every selected table from the source into the destination
    Sync {
        /// Print the summary as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}
