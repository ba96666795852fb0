//! In-process byte pipe connecting a bulk export to a bulk import.
//!
//! The pipe is a bounded FIFO of `Bytes` chunks, so memory use stays at
//! `capacity` chunks no matter how large the table is. Both ends watch the
//! same cancellation token: once it fires, pending and future reads and writes
//! fail with [`DbError::Cancelled`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{DbError, DbResult};

/// Create a connected writer/reader pair holding at most `capacity` chunks in flight.
pub fn pipe(capacity: usize, cancel: CancellationToken) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PipeWriter {
            tx,
            cancel: cancel.clone(),
        },
        PipeReader {
            rx,
            cancel,
            counter: None,
        },
    )
}

/// Producer end. Dropping it signals end-of-stream to the reader.
#[derive(Debug)]
pub struct PipeWriter {
    tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
}

impl PipeWriter {
    /// Send one chunk, waiting for room in the pipe.
    pub async fn write(&self, chunk: Bytes) -> DbResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DbError::Cancelled),
            sent = self.tx.send(chunk) => sent.map_err(|_| DbError::PipeClosed),
        }
    }
}

/// Consumer end.
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
    counter: Option<Arc<LineCounter>>,
}

impl PipeReader {
    /// Record every chunk read from here on in `counter`.
    pub fn tee(mut self, counter: Arc<LineCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Next chunk in FIFO order, or `None` once the writer is gone and the pipe is drained.
    pub async fn read(&mut self) -> DbResult<Option<Bytes>> {
        let chunk = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DbError::Cancelled),
            chunk = self.rx.recv() => chunk,
        };

        if let (Some(counter), Some(chunk)) = (&self.counter, &chunk) {
            counter.record(chunk);
        }

        Ok(chunk)
    }
}

/// Rows and bytes seen by the destination side of one table copy.
///
/// Text-format COPY escapes embedded newlines, so every `\n` terminates exactly one row.
#[derive(Debug, Default)]
pub struct LineCounter {
    lines: AtomicU64,
    bytes: AtomicU64,
}

impl LineCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, chunk: &[u8]) {
        let lines = chunk.iter().filter(|&&b| b == b'\n').count() as u64;
        self.lines.fetch_add(lines, Ordering::Relaxed);
        self.bytes.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    }

    pub fn lines(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pipe_preserves_order_and_signals_eof() {
        let (writer, mut reader) = pipe(2, CancellationToken::new());

        let producer = tokio::spawn(async move {
            for i in 0..10 {
                writer.write(Bytes::from(format!("{}\n", i))).await.unwrap();
            }
        });

        let mut seen = Vec::new();
        while let Some(chunk) = reader.read().await.unwrap() {
            seen.push(String::from_utf8(chunk.to_vec()).unwrap());
        }
        producer.await.unwrap();

        let expected: Vec<String> = (0..10).map(|i| format!("{}\n", i)).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_tee_counts_lines_and_bytes() {
        let counter = Arc::new(LineCounter::new());
        let (writer, reader) = pipe(4, CancellationToken::new());
        let mut reader = reader.tee(counter.clone());

        writer.write(Bytes::from_static(b"1\ta\n2\tb\n")).await.unwrap();
        writer.write(Bytes::from_static(b"3\tc\n")).await.unwrap();
        writer.write(Bytes::new()).await.unwrap();
        drop(writer);

        while reader.read().await.unwrap().is_some() {}

        assert_eq!(counter.lines(), 3);
        assert_eq!(counter.bytes(), 12);
    }

    #[tokio::test]
    async fn test_cancel_fails_both_ends() {
        let cancel = CancellationToken::new();
        let (writer, mut reader) = pipe(1, cancel.clone());

        writer.write(Bytes::from_static(b"x\n")).await.unwrap();
        cancel.cancel();

        assert!(matches!(
            writer.write(Bytes::from_static(b"y\n")).await,
            Err(DbError::Cancelled)
        ));
        assert!(matches!(reader.read().await, Err(DbError::Cancelled)));
    }

    #[tokio::test]
    async fn test_write_after_reader_dropped() {
        let (writer, reader) = pipe(1, CancellationToken::new());
        drop(reader);

        assert!(matches!(
            writer.write(Bytes::from_static(b"x\n")).await,
            Err(DbError::PipeClosed)
        ));
    }

    #[test]
    fn test_counter_concurrent_increments() {
        let counter = Arc::new(LineCounter::new());
        let chunk = b"row\nrow\nrow\n";

        let writers: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.record(chunk);
                    }
                })
            })
            .collect();

        let reader = {
            let counter = counter.clone();
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..1000 {
                    let now = counter.lines();
                    assert!(now >= last);
                    last = now;
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(counter.lines(), 8 * 1000 * 3);
        assert_eq!(counter.bytes(), 8 * 1000 * chunk.len() as u64);
    }
}
