//
//  diagnostics.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Injected diagnostics capability.
//!
//! Components never log through a process-wide handle for analysis
//! diagnostics; they receive a [`Diagnostics`] at construction. The default
//! sink forwards to `tracing`, tests use [`MemorySink`].

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::Level;

/// Receives diagnostic records from analysis components.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, level: Level, component: &'static str, message: &str);
}

/// Forwards records to `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, level: Level, component: &'static str, message: &str) {
        match level {
            Level::ERROR => tracing::error!(component, "{message}"),
            Level::WARN => tracing::warn!(component, "{message}"),
            Level::INFO => tracing::info!(component, "{message}"),
            Level::DEBUG => tracing::debug!(component, "{message}"),
            Level::TRACE => tracing::trace!(component, "{message}"),
        }
    }
}

/// One captured record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub level: Level,
    pub component: &'static str,
    pub message: String,
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records at WARN or above.
    pub fn warnings(&self) -> Vec<DiagnosticRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level <= Level::WARN)
            .collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, level: Level, component: &'static str, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(DiagnosticRecord {
                level,
                component,
                message: message.to_string(),
            });
        }
    }
}

/// Cloneable handle passed to every component.
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn DiagnosticSink>,
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    /// Diagnostics that go to `tracing`.
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    /// Diagnostics captured in memory, plus the sink to inspect them.
    pub fn memory() -> (Self, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        (Self::new(sink.clone()), sink)
    }

    pub fn warn(&self, component: &'static str, message: impl fmt::Display) {
        self.sink.record(Level::WARN, component, &message.to_string());
    }

    pub fn info(&self, component: &'static str, message: impl fmt::Display) {
        self.sink.record(Level::INFO, component, &message.to_string());
    }

    pub fn debug(&self, component: &'static str, message: impl fmt::Display) {
        self.sink.record(Level::DEBUG, component, &message.to_string());
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_in_order() {
        let (diagnostics, sink) = Diagnostics::memory();
        diagnostics.debug("store", "first");
        diagnostics.warn("store", format!("duplicate {}", 3));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "first");
        assert_eq!(records[1].level, Level::WARN);
        assert_eq!(sink.warnings().len(), 1, "only the warn record counts");
    }
}
