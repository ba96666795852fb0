//! Operator-facing progress reporting.
//!
//! Reporters are injected into the engine. They receive short human readable
//! status lines and must never block or fail the sync.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::info;

/// Sink for periodic status messages.
pub trait ProgressReporter: Send + Sync {
    fn progress(&self, message: &str);
}

impl<P: ProgressReporter + ?Sized> ProgressReporter for Arc<P> {
    fn progress(&self, message: &str) {
        (**self).progress(message)
    }
}

impl<P: ProgressReporter + ?Sized> ProgressReporter for &P {
    fn progress(&self, message: &str) {
        (**self).progress(message)
    }
}

/// Emits every status line as a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn progress(&self, message: &str) {
        info!(target: "swo::progress", "{}", message);
    }
}

/// The most recent status line and when it was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

/// Keeps the latest status so an operator-facing status query can read it.
///
/// Clones share the same status.
#[derive(Debug, Clone, Default)]
pub struct StatusProgress {
    latest: Arc<RwLock<Option<Status>>>,
}

impl StatusProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Status> {
        match self.latest.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressReporter for StatusProgress {
    fn progress(&self, message: &str) {
        let status = Status {
            message: message.to_string(),
            updated_at: Utc::now(),
        };
        match self.latest.write() {
            Ok(mut guard) => *guard = Some(status),
            Err(poisoned) => *poisoned.into_inner() = Some(status),
        }
    }
}

/// Fans a status line out to two reporters.
#[derive(Debug, Clone)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: ProgressReporter, B: ProgressReporter> ProgressReporter for Tee<A, B> {
    fn progress(&self, message: &str) {
        self.0.progress(message);
        self.1.progress(message);
    }
}
