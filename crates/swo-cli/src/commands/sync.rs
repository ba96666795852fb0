use anyhow::{Context, Result};
use colored::Colorize;
use swo_config::SwitchoverConfig;
use swo_core::{
    ErrorKind, StatusProgress, SyncEngine, SyncError, SyncSummary, Table, Tee, TracingProgress,
};
use swo_pg::{discover_tables, PgConnection};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::table_selection;

pub async fn cmd_sync(config: &SwitchoverConfig, json: bool) -> Result<()> {
    let mut source = PgConnection::connect(&config.source.connection_string)
        .await
        .context("Failed to connect to source database")?;
    let mut destination = PgConnection::connect(&config.destination.connection_string)
        .await
        .context("Failed to connect to destination database")?;

    let tables = discover_tables(source.client(), &table_selection(config))
        .await
        .context("Failed to list source tables")?;
    if tables.iter().all(|t| t.skip_sync()) {
        anyhow::bail!("No tables to sync. Check [tables] in your config.");
    }

    let cancel = shutdown_token();
    let status = StatusProgress::new();
    let engine = SyncEngine::new(
        config.sync_config(),
        Tee(TracingProgress, status.clone()),
    );

    info!(
        source = %source.description(),
        destination = %destination.description(),
        "Starting switch-over copy"
    );

    match engine
        .initial_sync(&cancel, &tables, &mut source, &mut destination)
        .await
    {
        Ok(summary) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(())
        }
        Err(e) => {
            if let Some(last) = status.latest() {
                eprintln!(
                    "  last status: {} (at {})",
                    last.message,
                    last.updated_at.format("%H:%M:%S")
                );
            }
            if let Some(hint) = hint(&e) {
                eprintln!("  {}", hint.yellow());
            }
            Err(anyhow::Error::new(e).context("Initial sync failed"))
        }
    }
}

/// A token cancelled on Ctrl-C.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Rolling back...");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    cancel
}

fn hint(error: &SyncError) -> Option<&'static str> {
    match error.kind() {
        ErrorKind::SerializationConflict => Some(
            "The source snapshot was invalidated by a concurrent write. Run 'swo sync' again.",
        ),
        ErrorKind::Maintenance => Some(
            "All data was committed. Run the maintenance statement on the destination manually.",
        ),
        _ if error.is_retryable() => {
            Some("Nothing was committed on the destination. Fix the cause and run 'swo sync' again.")
        }
        _ => None,
    }
}

fn print_summary(summary: &SyncSummary) {
    println!("\n{}", "Initial sync complete".green().bold());
    println!(
        "{:<40} {:>12} {:>12} {:>10}",
        "TABLE", "ROWS", "BYTES", "TIME"
    );
    println!("{}", "-".repeat(77));
    for table in &summary.tables {
        println!(
            "{:<40} {:>12} {:>12} {:>9.1}s",
            table.table,
            table.rows,
            table.bytes,
            table.elapsed_ms as f64 / 1000.0
        );
    }
    if !summary.skipped.is_empty() {
        println!("\nSkipped: {}", summary.skipped.join(", "));
    }
    println!(
        "\nTotal: {} rows in {:.1}s",
        summary.total_rows(),
        summary.elapsed().num_milliseconds() as f64 / 1000.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use swo_core::{DbError, TableSyncError};

    #[test]
    fn test_hint_for_serialization_conflict() {
        let err = SyncError::SourceCommit(DbError::query("could not serialize access"));
        assert!(hint(&err).unwrap().contains("swo sync"));
    }

    #[test]
    fn test_hint_for_maintenance() {
        let err = SyncError::Maintenance(DbError::query("canceling statement"));
        assert!(hint(&err).unwrap().contains("manually"));
    }

    #[test]
    fn test_hint_for_table_failure() {
        let err = SyncError::Table {
            table: "users".to_string(),
            source: TableSyncError::CopyToDestination(DbError::query("relation does not exist")),
        };
        assert!(hint(&err).unwrap().contains("Nothing was committed"));
    }

    #[test]
    fn test_no_hint_for_setup_or_cancel() {
        assert!(hint(&SyncError::Cancelled).is_none());
        assert!(hint(&SyncError::BeginSource(DbError::Connection("refused".into()))).is_none());
    }
}
