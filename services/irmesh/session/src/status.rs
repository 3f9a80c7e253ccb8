//! Human-facing status line output.

use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Destination for one-line status updates (a small display on real nodes).
///
/// `show` must not block; failures are the sink's own business.
pub trait StatusSink: Send + Sync {
    /// Replace the current status line
    fn show(&self, line: &str);
}

/// Writes status lines to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn show(&self, line: &str) {
        info!(target: "irmesh::status", "{}", line);
    }
}

/// Keeps every line shown, for inspection
#[derive(Debug, Default)]
pub struct MemoryStatusSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryStatusSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines shown so far, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent line
    pub fn last(&self) -> Option<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl StatusSink for MemoryStatusSink {
    fn show(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemoryStatusSink::new();
        assert_eq!(sink.last(), None);
        sink.show("one");
        sink.show("two");
        assert_eq!(sink.lines(), vec!["one", "two"]);
        assert_eq!(sink.last().as_deref(), Some("two"));
    }
}
