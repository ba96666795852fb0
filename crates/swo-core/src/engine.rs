//! Engine configuration and the summaries it reports for a completed sync.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::progress::ProgressReporter;

/// Tuning for the initial sync.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often per-table progress is reported.
    pub progress_interval: Duration,
    /// Chunks buffered between the export and the import of one table.
    pub pipe_capacity: usize,
    /// Statement run on the destination after both commits.
    pub maintenance: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_secs(2),
            pipe_capacity: 16,
            maintenance: "VACUUM ANALYZE".to_string(),
        }
    }
}

/// Copies a live database into a second instance from one consistent snapshot.
pub struct SyncEngine<P> {
    pub(crate) config: SyncConfig,
    pub(crate) progress: P,
}

impl<P: ProgressReporter> SyncEngine<P> {
    pub fn new(config: SyncConfig, progress: P) -> Self {
        Self { config, progress }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn progress(&self) -> &P {
        &self.progress
    }
}

/// Outcome of copying one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    /// Rows accepted by the destination.
    pub rows: u64,
    /// Row count taken from the source snapshot before the copy.
    pub estimated_rows: i64,
    pub bytes: u64,
    pub elapsed_ms: u64,
}

/// Outcome of a successful initial sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub tables: Vec<TableSummary>,
    pub skipped: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn rows_for(&self, table: &str) -> Option<u64> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, rows: u64) -> TableSummary {
        TableSummary {
            table: name.to_string(),
            rows,
            estimated_rows: rows as i64,
            bytes: rows * 10,
            elapsed_ms: 5,
        }
    }

    #[test]
    fn test_summary_totals() {
        let now = Utc::now();
        let summary = SyncSummary {
            tables: vec![table("a", 1000), table("b", 0), table("c", 50)],
            skipped: vec!["change_log".to_string()],
            started_at: now,
            finished_at: now + chrono::Duration::seconds(3),
        };

        assert_eq!(summary.total_rows(), 1050);
        assert_eq!(summary.rows_for("b"), Some(0));
        assert_eq!(summary.rows_for("missing"), None);
        assert_eq!(summary.elapsed().num_seconds(), 3);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["tables"][2]["rows"], 50);
        assert_eq!(json["skipped"][0], "change_log");
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.progress_interval, Duration::from_secs(2));
        assert_eq!(config.maintenance, "VACUUM ANALYZE");
    }
}
