//! Bounded ring of recent log lines.
//!
//! Every line the relay considers operator-visible goes through here: the
//! ring keeps the most recent [`LOG_RING_CAPACITY`] entries for the
//! `log_history` snapshot sent to newly connected UI clients, and each
//! append is echoed to the process log via `tracing`. Entries are
//! immutable once created.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::VecDeque;
use taplink_core::constants::LOG_RING_CAPACITY;
use tracing::info;

/// Where a log line originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrigin {
    /// The relay itself.
    Server,

    /// Forwarded from the reader device.
    Reader,

    /// Derived from a UI client action.
    Ui,

    /// No origin tag; the line is emitted as-is.
    None,
}

impl LogOrigin {
    fn tag(self) -> Option<&'static str> {
        match self {
            LogOrigin::Server => Some("Server"),
            LogOrigin::Reader => Some("Reader"),
            LogOrigin::Ui => Some("UI"),
            LogOrigin::None => None,
        }
    }
}

/// A single timestamped log line.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub origin: LogOrigin,
}

impl LogEntry {
    /// Render as the line shipped to UI clients:
    /// `[<rfc3339>] [<origin>] <text>`.
    #[must_use]
    pub fn formatted(&self) -> String {
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        match self.origin.tag() {
            Some(tag) => format!("[{timestamp}] [{tag}] {}", self.text),
            None => format!("[{timestamp}] {}", self.text),
        }
    }
}

/// Fixed-capacity, append-only ring of log entries.
pub struct LogRing {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogRing {
    /// Ring with the default capacity of [`LOG_RING_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(LOG_RING_CAPACITY)
    }

    /// Ring with an explicit capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest entry when full.
    ///
    /// Returns the formatted line so the caller can broadcast it as a
    /// `log` event. The line is also echoed to the process log.
    pub fn append(&mut self, origin: LogOrigin, text: impl Into<String>) -> String {
        let entry = LogEntry {
            timestamp: Utc::now(),
            text: text.into(),
            origin,
        };
        let line = entry.formatted();
        info!("{line}");

        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        line
    }

    /// Formatted lines, oldest to newest, for the `log_history` snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().map(LogEntry::formatted).collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new()
    }
}
