//! In-memory database for exercising the sync engine without a server.
//!
//! Tables hold text-format COPY rows. Transactions see the data committed when
//! they began, stage their writes, and publish them on commit. Every statement
//! is appended to a [`Journal`] that can be shared between two databases to
//! observe cross-database ordering.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::db::{Connection, Transaction, TxOptions};
use crate::error::{DbError, DbResult};
use crate::pipe::{PipeReader, PipeWriter};
use crate::progress::ProgressReporter;
use crate::table::Table;

type Tables = BTreeMap<String, Vec<String>>;

/// Ordered log of statements executed against one or more mock databases.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e == entry)
    }

    /// Index of the first matching entry.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == entry)
            .count()
    }
}

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    Execute,
    Count,
    CopyOut,
    CopyIn,
    Commit,
    /// A statement run on the connection outside a transaction.
    ConnectionExecute,
}

#[derive(Debug, Clone)]
struct FailRule {
    point: FailPoint,
    /// Only statements mentioning this table trip the rule.
    table: Option<String>,
    error: DbError,
}

#[derive(Debug)]
struct MockState {
    tables: Tables,
    failures: Vec<FailRule>,
    chunk_rows: usize,
    chunk_delay: Option<Duration>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            tables: Tables::new(),
            failures: Vec::new(),
            chunk_rows: 64,
            chunk_delay: None,
        }
    }
}

/// A mock database instance.
#[derive(Debug, Clone)]
pub struct MockDatabase {
    label: String,
    state: Arc<Mutex<MockState>>,
    journal: Journal,
}

impl MockDatabase {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_journal(label, Journal::new())
    }

    /// Create a database that logs into an existing journal.
    pub fn with_journal(label: impl Into<String>, journal: Journal) -> Self {
        Self {
            label: label.into(),
            state: Arc::new(Mutex::new(MockState::default())),
            journal,
        }
    }

    /// Create `table` holding `rows` generated rows.
    pub fn with_table<T: Table + ?Sized>(self, table: &T, rows: usize) -> Self {
        let data = (0..rows)
            .map(|i| format!("{}\t{}-{}", i, table.name(), i))
            .collect();
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(table.quoted_name(), data);
        self
    }

    /// Append committed rows to an existing table, as a concurrent writer would.
    pub fn insert_rows<T: Table + ?Sized>(&self, table: &T, rows: Vec<String>) {
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(table.quoted_name())
            .or_default()
            .extend(rows);
    }

    /// Committed rows of `table`, or `None` if it does not exist.
    pub fn rows<T: Table + ?Sized>(&self, table: &T) -> Option<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(&table.quoted_name())
            .cloned()
    }

    pub fn row_count<T: Table + ?Sized>(&self, table: &T) -> usize {
        self.rows(table).map(|r| r.len()).unwrap_or(0)
    }

    /// Fail every statement of the given kind.
    pub fn fail_at(&self, point: FailPoint, error: DbError) {
        self.state.lock().unwrap().failures.push(FailRule {
            point,
            table: None,
            error,
        });
    }

    /// Fail statements of the given kind that touch `table`.
    pub fn fail_on_table<T: Table + ?Sized>(&self, point: FailPoint, table: &T, error: DbError) {
        self.state.lock().unwrap().failures.push(FailRule {
            point,
            table: Some(table.quoted_name()),
            error,
        });
    }

    /// Rows per chunk produced by `COPY ... TO STDOUT`.
    pub fn set_chunk_rows(&self, rows: usize) {
        self.state.lock().unwrap().chunk_rows = rows.max(1);
    }

    /// Delay before each exported chunk, to simulate a slow export.
    pub fn set_chunk_delay(&self, delay: Duration) {
        self.state.lock().unwrap().chunk_delay = Some(delay);
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn connection(&self) -> MockConnection {
        MockConnection { db: self.clone() }
    }

    fn log(&self, entry: impl AsRef<str>) {
        self.journal
            .push(format!("{}: {}", self.label, entry.as_ref()));
    }

    fn check(&self, point: FailPoint, sql: &str) -> DbResult<()> {
        let state = self.state.lock().unwrap();
        let rule = state.failures.iter().find(|rule| {
            rule.point == point
                && rule
                    .table
                    .as_deref()
                    .map_or(true, |table| sql.contains(table))
        });
        match rule {
            Some(rule) => Err(rule.error.clone()),
            None => Ok(()),
        }
    }
}

pub struct MockConnection {
    db: MockDatabase,
}

impl Connection for MockConnection {
    type Tx<'a> = MockTransaction
    where
        Self: 'a;

    fn begin(&mut self, options: TxOptions) -> impl Future<Output = DbResult<MockTransaction>> + Send {
        let db = self.db.clone();
        async move {
            db.check(FailPoint::Begin, "")?;

            let mut entry = String::from("begin");
            if let Some(level) = options.isolation {
                entry.push_str(&format!(" {}", level));
            }
            if options.read_only {
                entry.push_str(" read only");
            }
            if options.deferrable {
                entry.push_str(" deferrable");
            }
            db.log(entry);

            let snapshot = db.state.lock().unwrap().tables.clone();
            Ok(MockTransaction {
                db,
                options,
                staged: Mutex::new(snapshot.clone()),
                snapshot,
                finished: false,
            })
        }
    }

    fn execute(&mut self, sql: &str) -> impl Future<Output = DbResult<()>> + Send {
        let db = self.db.clone();
        async move {
            db.check(FailPoint::ConnectionExecute, sql)?;
            db.log(sql);
            Ok(())
        }
    }
}

pub struct MockTransaction {
    db: MockDatabase,
    options: TxOptions,
    snapshot: Tables,
    staged: Mutex<Tables>,
    finished: bool,
}

fn missing_relation(name: &str) -> DbError {
    DbError::with_code(format!("relation {} does not exist", name), "42P01")
}

impl Transaction for MockTransaction {
    fn execute(&self, sql: &str) -> impl Future<Output = DbResult<()>> + Send {
        async move {
            self.db.check(FailPoint::Execute, sql)?;
            self.db.log(sql);
            Ok(())
        }
    }

    fn query_count(&self, sql: &str) -> impl Future<Output = DbResult<i64>> + Send {
        async move {
            self.db.check(FailPoint::Count, sql)?;
            self.db.log(sql);

            let table = sql.trim_start_matches("select count(*) from ");
            self.snapshot
                .get(table)
                .map(|rows| rows.len() as i64)
                .ok_or_else(|| missing_relation(table))
        }
    }

    fn copy_out(
        &self,
        sql: &str,
        writer: PipeWriter,
    ) -> impl Future<Output = DbResult<u64>> + Send {
        async move {
            self.db.check(FailPoint::CopyOut, sql)?;
            self.db.log(sql);

            let table = copy_target(sql);
            let rows = self
                .snapshot
                .get(table)
                .ok_or_else(|| missing_relation(table))?;
            let (chunk_rows, delay) = {
                let state = self.db.state.lock().unwrap();
                (state.chunk_rows, state.chunk_delay)
            };

            let mut written = 0u64;
            for chunk in rows.chunks(chunk_rows) {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                let mut buf = String::new();
                for row in chunk {
                    buf.push_str(row);
                    buf.push('\n');
                }
                written += buf.len() as u64;
                writer.write(Bytes::from(buf)).await?;
            }
            Ok(written)
        }
    }

    fn copy_in(
        &self,
        sql: &str,
        mut reader: PipeReader,
    ) -> impl Future<Output = DbResult<u64>> + Send {
        async move {
            if self.options.read_only {
                return Err(DbError::with_code(
                    "cannot execute COPY FROM in a read-only transaction",
                    "25006",
                ));
            }
            self.db.check(FailPoint::CopyIn, sql)?;
            self.db.log(sql);

            let table = copy_target(sql);
            if !self.staged.lock().unwrap().contains_key(table) {
                return Err(missing_relation(table));
            }

            let mut pending: Vec<u8> = Vec::new();
            let mut rows = Vec::new();
            while let Some(chunk) = reader.read().await? {
                pending.extend_from_slice(&chunk);
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    rows.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
                }
            }
            if !pending.is_empty() {
                rows.push(String::from_utf8_lossy(&pending).into_owned());
            }

            let count = rows.len() as u64;
            self.staged
                .lock()
                .unwrap()
                .entry(table.to_string())
                .or_default()
                .extend(rows);
            Ok(count)
        }
    }

    fn commit(mut self) -> impl Future<Output = DbResult<()>> + Send {
        async move {
            self.finished = true;
            if let Err(e) = self.db.check(FailPoint::Commit, "") {
                self.db.log("commit failed");
                return Err(e);
            }

            if !self.options.read_only {
                let staged = std::mem::take(&mut *self.staged.lock().unwrap());
                self.db.state.lock().unwrap().tables = staged;
            }
            self.db.log("commit");
            Ok(())
        }
    }

    fn rollback(mut self) -> impl Future<Output = DbResult<()>> + Send {
        async move {
            self.finished = true;
            self.db.log("rollback");
            Ok(())
        }
    }
}

impl Drop for MockTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.db.log("rollback");
        }
    }
}

/// Table name in a `copy <table> to stdout` / `copy <table> from stdin` statement.
fn copy_target(sql: &str) -> &str {
    let rest = sql.trim_start_matches("copy ");
    rest.trim_end_matches(" to stdout")
        .trim_end_matches(" from stdin")
}

/// Progress reporter that remembers every message.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.messages.lock().unwrap().iter().any(|m| m == message)
    }
}

impl ProgressReporter for RecordingProgress {
    fn progress(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableDef;

    #[tokio::test]
    async fn test_rollback_keeps_committed_rows() {
        let table = TableDef::new("public", "t");
        let db = MockDatabase::new("db").with_table(&table, 0);
        let mut conn = db.connection();

        let tx = conn.begin(TxOptions::default()).await.unwrap();
        db.insert_rows(&table, vec!["outside".into()]);
        assert_eq!(db.row_count(&table), 1);

        tx.rollback().await.unwrap();
        assert_eq!(db.row_count(&table), 1);
        assert_eq!(db.journal().entries(), vec!["db: begin", "db: rollback"]);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let db = MockDatabase::new("db");
        let mut conn = db.connection();
        {
            let _tx = conn.begin(TxOptions::snapshot()).await.unwrap();
        }
        assert_eq!(
            db.journal().entries(),
            vec!["db: begin serializable read only deferrable", "db: rollback"]
        );
    }

    #[tokio::test]
    async fn test_table_scoped_failure() {
        let a = TableDef::new("public", "a");
        let b = TableDef::new("public", "b");
        let db = MockDatabase::new("db").with_table(&a, 1).with_table(&b, 1);
        db.fail_on_table(FailPoint::Count, &b, DbError::query("nope"));

        let mut conn = db.connection();
        let tx = conn.begin(TxOptions::snapshot()).await.unwrap();
        assert_eq!(
            tx.query_count(&format!("select count(*) from {}", a.quoted_name()))
                .await
                .unwrap(),
            1
        );
        assert!(tx
            .query_count(&format!("select count(*) from {}", b.quoted_name()))
            .await
            .is_err());
    }

    #[test]
    fn test_copy_target() {
        assert_eq!(copy_target("copy \"public\".\"a\" to stdout"), "\"public\".\"a\"");
        assert_eq!(copy_target("copy \"public\".\"a\" from stdin"), "\"public\".\"a\"");
    }
}
