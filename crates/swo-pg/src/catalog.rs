//! Discovery of the tables that take part in a switch-over.

use swo_core::TableDef;
use tokio_postgres::Client;
use tracing::{debug, info};

use crate::error::{PgError, PgResult};

/// Which tables of a schema to copy.
#[derive(Debug, Clone, Default)]
pub struct TableSelection {
    pub schema: String,
    /// Tables to copy, in this order. Empty means every base table in the schema.
    pub include: Vec<String>,
    /// Tables never copied.
    pub skip: Vec<String>,
}

/// List base tables of the selected schema, ordered by name, marking skipped ones.
pub async fn discover_tables(client: &Client, selection: &TableSelection) -> PgResult<Vec<TableDef>> {
    let rows = client
        .query(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
            &[&selection.schema],
        )
        .await?;

    let available: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
    debug!(schema = %selection.schema, count = available.len(), "Found tables");

    let tables = select_tables(selection, &available)?;
    info!(
        schema = %selection.schema,
        sync = tables.iter().filter(|t| !t.skip).count(),
        skip = tables.iter().filter(|t| t.skip).count(),
        "Resolved switch-over tables"
    );
    Ok(tables)
}

/// Check if a table exists.
pub async fn table_exists(client: &Client, schema: &str, table: &str) -> PgResult<bool> {
    let row = client
        .query_one(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            "#,
            &[&schema, &table],
        )
        .await?;

    Ok(row.get(0))
}

/// Apply an include/skip selection to the tables present in the schema.
fn select_tables(selection: &TableSelection, available: &[String]) -> PgResult<Vec<TableDef>> {
    let names: Vec<&String> = if selection.include.is_empty() {
        available.iter().collect()
    } else {
        for name in &selection.include {
            if !available.contains(name) {
                return Err(PgError::TableNotFound(format!(
                    "{}.{}",
                    selection.schema, name
                )));
            }
        }
        selection.include.iter().collect()
    };

    Ok(names
        .into_iter()
        .map(|name| TableDef {
            schema: selection.schema.clone(),
            name: name.clone(),
            skip: selection.skip.contains(name),
        })
        .collect())
}
