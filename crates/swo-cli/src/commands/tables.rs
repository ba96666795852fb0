use anyhow::{Context, Result};
use colored::Colorize;
use swo_config::SwitchoverConfig;
use swo_core::Table;
use swo_pg::{discover_tables, PgConnection};

use crate::config::table_selection;

pub async fn cmd_tables(config: &SwitchoverConfig) -> Result<()> {
    let source = PgConnection::connect(&config.source.connection_string)
        .await
        .context("Failed to connect to source database")?;

    let selection = table_selection(config);
    let tables = discover_tables(source.client(), &selection)
        .await
        .context("Failed to list source tables")?;

    if tables.is_empty() {
        println!("No tables found in schema {}.", selection.schema);
        return Ok(());
    }

    println!("{:<40} {}", "TABLE", "ACTION");
    println!("{}", "-".repeat(48));
    for table in &tables {
        let action = if table.skip_sync() {
            "skip".yellow()
        } else {
            "sync".green()
        };
        println!("{:<40} {}", table.quoted_name(), action);
    }

    let synced = tables.iter().filter(|t| !t.skip_sync()).count();
    println!(
        "\n{} to sync, {} skipped",
        synced,
        tables.len() - synced
    );
    Ok(())
}
