//! Snapshot-consistent bulk copy of every table from the source to the destination.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::db::{Connection, Transaction, TxOptions};
use crate::engine::{SyncEngine, SyncSummary, TableSummary};
use crate::error::{SyncError, SyncResult};
use crate::progress::ProgressReporter;
use crate::table::Table;

impl<P: ProgressReporter> SyncEngine<P> {
    /// Copy all non-skipped `tables` from `source` into `destination`.
    ///
    /// Every table is read from one read-only, serializable, deferrable
    /// snapshot and written in one destination transaction with constraints
    /// deferred. The source is committed before the destination, so the
    /// destination only ever commits data from a snapshot the source has
    /// validated. Any failure rolls back whatever is still open.
    ///
    /// A [`SyncError::SourceCommit`] means the snapshot was invalidated and
    /// the whole attempt should be retried.
    pub async fn initial_sync<T, S, D>(
        &self,
        cancel: &CancellationToken,
        tables: &[T],
        source: &mut S,
        destination: &mut D,
    ) -> SyncResult<SyncSummary>
    where
        T: Table,
        S: Connection,
        D: Connection,
    {
        let started_at = Utc::now();
        info!(tables = tables.len(), "Starting initial sync");

        let src_tx = source
            .begin(TxOptions::snapshot())
            .await
            .map_err(SyncError::BeginSource)?;

        let dst_tx = match destination.begin(TxOptions::default()).await {
            Ok(tx) => tx,
            Err(e) => {
                release(src_tx, "src").await;
                return Err(SyncError::BeginDestination(e));
            }
        };

        let (synced, skipped) = match self.load(cancel, tables, &src_tx, &dst_tx).await {
            Ok(loaded) => loaded,
            Err(e) => {
                release(src_tx, "src").await;
                release(dst_tx, "dst").await;
                return Err(e);
            }
        };

        self.progress.progress("commit initial sync");

        // A read-only commit still has to be checked: failing here means the
        // serializable snapshot was violated and the attempt must be repeated.
        if let Err(e) = src_tx.commit().await {
            warn!(error = %e, "Source commit failed; snapshot invalidated");
            release(dst_tx, "dst").await;
            return Err(SyncError::SourceCommit(e));
        }

        dst_tx
            .commit()
            .await
            .map_err(SyncError::DestinationCommit)?;

        info!(
            tables = synced.len(),
            rows = synced.iter().map(|t| t.rows).sum::<u64>(),
            "Initial sync committed"
        );

        self.progress.progress("vacuum analyze");
        destination
            .execute(&self.config.maintenance)
            .await
            .map_err(SyncError::Maintenance)?;

        let summary = SyncSummary {
            tables: synced,
            skipped,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            elapsed_ms = summary.elapsed().num_milliseconds(),
            "Initial sync complete"
        );
        Ok(summary)
    }

    /// Defer constraints, then copy each table in order, stopping at the first failure.
    async fn load<T, S, D>(
        &self,
        cancel: &CancellationToken,
        tables: &[T],
        src_tx: &S,
        dst_tx: &D,
    ) -> SyncResult<(Vec<TableSummary>, Vec<String>)>
    where
        T: Table,
        S: Transaction,
        D: Transaction,
    {
        dst_tx
            .execute("SET CONSTRAINTS ALL DEFERRED")
            .await
            .map_err(SyncError::DeferConstraints)?;

        let mut synced = Vec::with_capacity(tables.len());
        let mut skipped = Vec::new();

        for table in tables {
            if table.skip_sync() {
                skipped.push(table.name().to_string());
                continue;
            }
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            match self.sync_table(cancel, table, src_tx, dst_tx).await {
                Ok(summary) => {
                    info!(table = table.name(), rows = summary.rows, "Synced table");
                    synced.push(summary);
                }
                Err(_) if cancel.is_cancelled() => return Err(SyncError::Cancelled),
                Err(e) => {
                    return Err(SyncError::Table {
                        table: table.name().to_string(),
                        source: e,
                    })
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        Ok((synced, skipped))
    }
}

async fn release<X: Transaction>(tx: X, side: &str) {
    if let Err(e) = tx.rollback().await {
        warn!(side, error = %e, "Rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyncConfig;
    use crate::error::{DbError, ErrorKind};
    use crate::mock::{FailPoint, Journal, MockDatabase, RecordingProgress};
    use crate::table::TableDef;

    fn pair(tables: &[TableDef]) -> (MockDatabase, MockDatabase, Journal) {
        let journal = Journal::new();
        let mut source = MockDatabase::with_journal("src", journal.clone());
        let mut dest = MockDatabase::with_journal("dst", journal.clone());
        for (i, table) in tables.iter().enumerate() {
            source = source.with_table(table, i * 10);
            dest = dest.with_table(table, 0);
        }
        (source, dest, journal)
    }

    #[tokio::test]
    async fn test_begin_source_failure_touches_nothing() {
        let tables = vec![TableDef::new("public", "a")];
        let (source, dest, journal) = pair(&tables);
        source.fail_at(FailPoint::Begin, DbError::Connection("gone".into()));

        let engine = SyncEngine::new(SyncConfig::default(), RecordingProgress::new());
        let err = engine
            .initial_sync(
                &CancellationToken::new(),
                &tables,
                &mut source.connection(),
                &mut dest.connection(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Setup);
        assert!(err.to_string().starts_with("begin src tx:"));
        assert!(journal.entries().is_empty());
    }

    #[tokio::test]
    async fn test_begin_destination_failure_releases_source() {
        let tables = vec![TableDef::new("public", "a")];
        let (source, dest, journal) = pair(&tables);
        dest.fail_at(FailPoint::Begin, DbError::Connection("refused".into()));

        let engine = SyncEngine::new(SyncConfig::default(), RecordingProgress::new());
        let err = engine
            .initial_sync(
                &CancellationToken::new(),
                &tables,
                &mut source.connection(),
                &mut dest.connection(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::BeginDestination(_)));
        assert_eq!(
            journal.entries(),
            vec!["src: begin serializable read only deferrable", "src: rollback"]
        );
    }

    #[tokio::test]
    async fn test_defer_constraints_failure() {
        let tables = vec![TableDef::new("public", "a")];
        let (source, dest, journal) = pair(&tables);
        dest.fail_at(FailPoint::Execute, DbError::query("syntax error"));

        let engine = SyncEngine::new(SyncConfig::default(), RecordingProgress::new());
        let err = engine
            .initial_sync(
                &CancellationToken::new(),
                &tables,
                &mut source.connection(),
                &mut dest.connection(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::DeferConstraints(_)));
        assert!(journal.contains("src: rollback"));
        assert!(journal.contains("dst: rollback"));
        assert!(!journal.contains("src: select count(*) from \"public\".\"a\""));
    }

    #[tokio::test]
    async fn test_skipped_tables_are_not_touched() {
        let tables = vec![
            TableDef::new("public", "a"),
            TableDef::new("public", "change_log").skipped(),
        ];
        let (source, dest, journal) = pair(&tables);

        let engine = SyncEngine::new(SyncConfig::default(), RecordingProgress::new());
        let summary = engine
            .initial_sync(
                &CancellationToken::new(),
                &tables,
                &mut source.connection(),
                &mut dest.connection(),
            )
            .await
            .unwrap();

        assert_eq!(summary.skipped, vec!["change_log"]);
        assert_eq!(summary.tables.len(), 1);
        assert!(journal
            .entries()
            .iter()
            .all(|e| !e.contains("change_log")));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let tables = vec![TableDef::new("public", "a")];
        let (source, dest, journal) = pair(&tables);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let engine = SyncEngine::new(SyncConfig::default(), RecordingProgress::new());
        let err = engine
            .initial_sync(&cancel, &tables, &mut source.connection(), &mut dest.connection())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(journal.contains("src: rollback"));
        assert!(journal.contains("dst: rollback"));
        assert!(!journal.contains("dst: commit"));
    }
}
