//! Progress and message sinks for an import.

use std::sync::Mutex;
use tracing::{info, trace, warn};

/// Sink for import messages. Shared by reference, so it must be thread-safe.
pub trait ImportLogger: Send + Sync {
    /// Informational message.
    fn log(&self, message: &str);

    /// Warning or error message.
    fn error(&self, message: &str);

    /// Completion fraction in `[0, 1]`.
    fn progress(&self, fraction: f64);
}

/// Forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ImportLogger for TracingLogger {
    fn log(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        warn!("{}", message);
    }

    fn progress(&self, fraction: f64) {
        trace!("Progress {:.1}%", fraction * 100.0);
    }
}

/// One message captured by [`MemoryLogger`].
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Log(String),
    Error(String),
    Progress(f64),
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.filtered(|e| match e {
            LogEntry::Log(m) => Some(m.clone()),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<String> {
        self.filtered(|e| match e {
            LogEntry::Error(m) => Some(m.clone()),
            _ => None,
        })
    }

    /// Last reported progress fraction.
    pub fn last_progress(&self) -> Option<f64> {
        self.lock().iter().rev().find_map(|e| match e {
            LogEntry::Progress(p) => Some(*p),
            _ => None,
        })
    }

    fn filtered<T>(&self, f: impl Fn(&LogEntry) -> Option<T>) -> Vec<T> {
        self.lock().iter().filter_map(f).collect()
    }

    fn push(&self, entry: LogEntry) {
        self.lock().push(entry);
    }

    // A poisoned lock only means another thread panicked mid-push; the
    // entries themselves are still valid.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ImportLogger for MemoryLogger {
    fn log(&self, message: &str) {
        self.push(LogEntry::Log(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(LogEntry::Error(message.to_string()));
    }

    fn progress(&self, fraction: f64) {
        self.push(LogEntry::Progress(fraction));
    }
}
