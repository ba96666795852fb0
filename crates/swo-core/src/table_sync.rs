//! Streaming copy of a single table from the source snapshot to the destination.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::db::Transaction;
use crate::engine::{SyncEngine, TableSummary};
use crate::error::TableSyncError;
use crate::pipe::{pipe, LineCounter};
use crate::progress::ProgressReporter;
use crate::table::Table;

impl<P: ProgressReporter> SyncEngine<P> {
    /// Copy every row of `table` visible in `src` into `dst`.
    ///
    /// The export, the import and a progress ticker run concurrently, joined by
    /// a bounded pipe. When the import finishes, successfully or not, the other
    /// two are cancelled. A destination error takes priority over a source error.
    pub async fn sync_table<T, S, D>(
        &self,
        cancel: &CancellationToken,
        table: &T,
        src: &S,
        dst: &D,
    ) -> Result<TableSummary, TableSyncError>
    where
        T: Table + ?Sized,
        S: Transaction,
        D: Transaction,
    {
        let started = Instant::now();
        let quoted = table.quoted_name();

        let total = src
            .query_count(&format!("select count(*) from {}", quoted))
            .await
            .map_err(TableSyncError::CountRows)?;

        let cancel = cancel.child_token();
        let counter = Arc::new(LineCounter::new());
        let (writer, reader) = pipe(self.config.pipe_capacity, cancel.clone());
        let reader = reader.tee(counter.clone());

        let ticker = async {
            let mut interval = tokio::time::interval(self.config.progress_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                self.progress.progress(&format!(
                    "syncing table {} ({}/{})",
                    table.name(),
                    counter.lines(),
                    total
                ));

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }
            }
        };

        let source = async {
            src.copy_out(&format!("copy {} to stdout", quoted), writer)
                .await
        };

        let destination = async {
            let result = dst
                .copy_in(&format!("copy {} from stdin", quoted), reader)
                .await;
            cancel.cancel();
            result
        };

        let ((), src_result, dst_result) = tokio::join!(ticker, source, destination);

        let rows = dst_result.map_err(TableSyncError::CopyToDestination)?;
        src_result.map_err(TableSyncError::CopyFromSource)?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            table = table.name(),
            rows,
            estimated_rows = total,
            bytes = counter.bytes(),
            elapsed_ms,
            "Copied table"
        );

        Ok(TableSummary {
            table: table.name().to_string(),
            rows,
            estimated_rows: total,
            bytes: counter.bytes(),
            elapsed_ms,
        })
    }
}
