//! Connection and transaction capabilities the engine needs from a database driver.

use std::fmt;
use std::future::Future;

use crate::error::DbResult;
use crate::pipe::{PipeReader, PipeWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationLevel::ReadCommitted => write!(f, "read committed"),
            IsolationLevel::RepeatableRead => write!(f, "repeatable read"),
            IsolationLevel::Serializable => write!(f, "serializable"),
        }
    }
}

/// Options for beginning a transaction. The default is the server's default
/// isolation level, read-write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
    /// Wait for a snapshot that is guaranteed free of serialization anomalies.
    /// Only meaningful for serializable read-only transactions.
    pub deferrable: bool,
}

impl TxOptions {
    /// Read-only, serializable, deferrable: a consistent snapshot of the source
    /// that does not hold up writers.
    pub fn snapshot() -> Self {
        Self {
            isolation: Some(IsolationLevel::Serializable),
            read_only: true,
            deferrable: true,
        }
    }
}

/// A live connection to one database instance.
pub trait Connection: Send {
    type Tx<'a>: Transaction
    where
        Self: 'a;

    fn begin(&mut self, options: TxOptions) -> impl Future<Output = DbResult<Self::Tx<'_>>> + Send;

    /// Run a statement outside of any transaction.
    fn execute(&mut self, sql: &str) -> impl Future<Output = DbResult<()>> + Send;
}

/// An open transaction. Dropping it without committing rolls it back.
pub trait Transaction: Send + Sync {
    fn execute(&self, sql: &str) -> impl Future<Output = DbResult<()>> + Send;

    /// Run a query returning a single integer, such as `count(*)`.
    fn query_count(&self, sql: &str) -> impl Future<Output = DbResult<i64>> + Send;

    /// Run a `COPY ... TO STDOUT` statement, writing its output into `writer`.
    /// Returns the number of bytes produced. The writer is dropped on return.
    fn copy_out(&self, sql: &str, writer: PipeWriter)
        -> impl Future<Output = DbResult<u64>> + Send;

    /// Run a `COPY ... FROM STDIN` statement fed from `reader` until end-of-stream.
    /// Returns the number of rows the server accepted.
    fn copy_in(&self, sql: &str, reader: PipeReader) -> impl Future<Output = DbResult<u64>> + Send;

    fn commit(self) -> impl Future<Output = DbResult<()>> + Send;

    fn rollback(self) -> impl Future<Output = DbResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_options() {
        let opts = TxOptions::snapshot();
        assert_eq!(opts.isolation, Some(IsolationLevel::Serializable));
        assert!(opts.read_only);
        assert!(opts.deferrable);

        let default = TxOptions::default();
        assert_eq!(default.isolation, None);
        assert!(!default.read_only);
    }
}
