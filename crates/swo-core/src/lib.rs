pub mod db;
pub mod engine;
pub mod error;
mod initial_sync;
pub mod mock;
pub mod pipe;
pub mod progress;
pub mod table;
mod table_sync;

pub use db::{Connection, IsolationLevel, Transaction, TxOptions};
pub use engine::{SyncConfig, SyncEngine, SyncSummary, TableSummary};
pub use error::{
    DbError, DbResult, ErrorKind, SyncError, SyncResult, TableSyncError, SERIALIZATION_FAILURE,
};
pub use pipe::{pipe, LineCounter, PipeReader, PipeWriter};
pub use progress::{ProgressReporter, Status, StatusProgress, Tee, TracingProgress};
pub use table::{quote_ident, Table, TableDef};
