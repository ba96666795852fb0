use anyhow::{Context, Result};
use colored::Colorize;
use swo_config::SwitchoverConfig;
use swo_core::Table;
use swo_pg::{discover_tables, table_exists, PgConnection};

use crate::config::table_selection;

pub async fn cmd_check(config: &SwitchoverConfig) -> Result<()> {
    let source = PgConnection::connect(&config.source.connection_string)
        .await
        .context("Failed to connect to source database")?;
    let destination = PgConnection::connect(&config.destination.connection_string)
        .await
        .context("Failed to connect to destination database")?;

    for (label, conn) in [("Source", &source), ("Destination", &destination)] {
        let version = conn
            .ping()
            .await
            .with_context(|| format!("{} database did not answer", label))?;
        println!("{:<12} {} {}", label, "✓".green(), conn.description());
        println!("{:<12} {}", "", version.dimmed());
    }

    let selection = table_selection(config);
    let tables = discover_tables(source.client(), &selection)
        .await
        .context("Failed to list source tables")?;

    println!();
    let mut missing = Vec::new();
    for table in tables.iter().filter(|t| !t.skip_sync()) {
        let exists = table_exists(destination.client(), &table.schema, &table.name)
            .await
            .with_context(|| format!("Failed to look up {} on destination", table.name()))?;
        if exists {
            println!("  {} {}", "✓".green(), table.name());
        } else {
            println!("  {} {} (missing on destination)", "✗".red(), table.name());
            missing.push(table.name().to_string());
        }
    }

    if !missing.is_empty() {
        anyhow::bail!(
            "{} table(s) missing on destination: {}. Apply the schema before syncing.",
            missing.len(),
            missing.join(", ")
        );
    }

    println!("\n{}", "Ready to sync.".green());
    Ok(())
}
