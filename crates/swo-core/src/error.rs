use thiserror::Error;

/// SQLSTATE reported when a serializable transaction cannot be committed.
pub const SERIALIZATION_FAILURE: &str = "40001";

/// Errors reported by a database connection or transaction.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("{message}")]
    Query {
        message: String,
        /// SQLSTATE, when the server reported one.
        code: Option<String>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("pipe closed by peer")]
    PipeClosed,
}

impl DbError {
    pub fn query(message: impl Into<String>) -> Self {
        DbError::Query {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        DbError::Query {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// SQLSTATE of the failure, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            DbError::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn is_serialization_failure(&self) -> bool {
        self.code() == Some(SERIALIZATION_FAILURE)
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Failure while copying a single table.
#[derive(Debug, Error)]
pub enum TableSyncError {
    #[error("count rows: {0}")]
    CountRows(#[source] DbError),

    #[error("copy from src: {0}")]
    CopyFromSource(#[source] DbError),

    #[error("copy to dst: {0}")]
    CopyToDestination(#[source] DbError),
}

/// Broad classes of initial sync failure.
///
/// Callers decide what to do next from the kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Could not open either transaction or defer constraints. No work was done.
    Setup,
    /// A table failed to copy. Both transactions were rolled back.
    Table,
    /// The source snapshot was invalidated at commit time.
    SerializationConflict,
    /// The destination rejected the commit. The source was only read.
    DestinationCommit,
    /// Data is committed but post-load maintenance failed.
    Maintenance,
    /// The caller cancelled the attempt.
    Cancelled,
}

/// Errors returned by the initial sync coordinator.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("begin src tx: {0}")]
    BeginSource(#[source] DbError),

    #[error("begin dst tx: {0}")]
    BeginDestination(#[source] DbError),

    #[error("defer constraints: {0}")]
    DeferConstraints(#[source] DbError),

    #[error("sync table {table}: {source}")]
    Table {
        table: String,
        #[source]
        source: TableSyncError,
    },

    #[error("commit src tx: {0}")]
    SourceCommit(#[source] DbError),

    #[error("commit dst tx: {0}")]
    DestinationCommit(#[source] DbError),

    #[error("vacuum analyze: {0}")]
    Maintenance(#[source] DbError),

    #[error("initial sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::BeginSource(_)
            | SyncError::BeginDestination(_)
            | SyncError::DeferConstraints(_) => ErrorKind::Setup,
            SyncError::Table { .. } => ErrorKind::Table,
            // A read-only commit can only fail if the snapshot was invalidated,
            // whether or not the server tagged it 40001.
            SyncError::SourceCommit(_) => ErrorKind::SerializationConflict,
            SyncError::DestinationCommit(_) => ErrorKind::DestinationCommit,
            SyncError::Maintenance(_) => ErrorKind::Maintenance,
            SyncError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the whole attempt should be repeated from a fresh snapshot.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SerializationConflict | ErrorKind::Table | ErrorKind::DestinationCommit
        )
    }

    /// Name of the table that failed, for per-table errors.
    pub fn table(&self) -> Option<&str> {
        match self {
            SyncError::Table { table, .. } => Some(table),
            _ => None,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
