//! Structured logging: a `tracing-subscriber` fmt layer honoring `RUST_LOG`
//! (or a configured default level), plus an in-memory ring buffer so recent
//! log lines can be surfaced alongside a namespace's structured
//! [`Diagnostic`](crate::error::Diagnostic) records.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub sequence: u64,
    pub timestamp: String,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
}

/// Thread-safe circular buffer of recent log entries.
///
/// Capacity can be overridden at runtime via `DEP_LINKER_LOG_BUFFER_CAPACITY`.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
    sequence_counter: Arc<AtomicU64>,
}

impl LogBuffer {
    pub fn new() -> Self {
        let capacity = std::env::var("DEP_LINKER_LOG_BUFFER_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_BUFFER_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            sequence_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn push(&self, mut entry: LogEntry) {
        entry.sequence = self.sequence_counter.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(entry);
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
    }

    /// Get the last `count` entries. Takes a blocking lock rather than
    /// `try_lock`: under load a `try_lock` miss reads as an empty buffer,
    /// which is worse than a brief wait.
    pub fn get_last(&self, count: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock().expect("log buffer mutex poisoned");
        let take_count = count.min(entries.len());
        entries.iter().rev().take(take_count).rev().cloned().collect()
    }

    pub fn get_since_sequence(&self, since: u64, limit: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock().expect("log buffer mutex poisoned");
        entries.iter().filter(|e| e.sequence > since).take(limit).cloned().collect()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracing layer that mirrors events into a [`LogBuffer`].
pub struct MemoryLogLayer {
    buffer: LogBuffer,
}

impl MemoryLogLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    fn format_message(event: &Event<'_>) -> String {
        struct MessageVisitor(String);
        impl tracing::field::Visit for MessageVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = format!("{value:?}");
                    if self.0.starts_with('"') && self.0.ends_with('"') {
                        self.0 = self.0[1..self.0.len() - 1].to_string();
                    }
                }
            }
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.0 = value.to_string();
                }
            }
        }

        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        if visitor.0.is_empty() {
            event.metadata().target().to_string()
        } else {
            visitor.0
        }
    }
}

impl<S> Layer<S> for MemoryLogLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let entry = LogEntry {
            sequence: 0,
            timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
            level: metadata.level().into(),
            target: metadata.target().to_string(),
            message: Self::format_message(event),
        };
        self.buffer.push(entry);
    }
}

/// Install a global subscriber combining an `EnvFilter`-gated stderr writer
/// with an in-memory ring buffer, and return the buffer so callers (the CLI,
/// tests) can inspect recent log lines. `default_level` is used only when
/// `RUST_LOG` is unset.
///
/// Safe to call more than once in a process (e.g. across tests): a failed
/// `set_global_default` is ignored, tolerating a subscriber that is already
/// installed.
pub fn init_logging(default_level: &str) -> LogBuffer {
    let buffer = LogBuffer::new();
    let memory_layer = MemoryLogLayer::new(buffer.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(memory_layer)
        .with(fmt_layer)
        .try_init();

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            sequence: 0,
            timestamp: "2024-01-01 00:00:00.000 UTC".to_string(),
            level: LogLevel::Info,
            target: "test".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn push_assigns_increasing_sequence_numbers() {
        let buffer = LogBuffer::new();
        buffer.push(entry("first"));
        buffer.push(entry("second"));
        let all = buffer.get_last(10);
        assert_eq!(all[0].sequence, 0);
        assert_eq!(all[1].sequence, 1);
    }

    #[test]
    fn buffer_respects_capacity_as_a_ring() {
        let buffer = LogBuffer {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: 3,
            sequence_counter: Arc::new(AtomicU64::new(0)),
        };
        for i in 0..5 {
            buffer.push(entry(&format!("m{i}")));
        }
        assert_eq!(buffer.len(), 3);
        let all = buffer.get_last(10);
        assert_eq!(all[0].message, "m2");
        assert_eq!(all[2].message, "m4");
    }

    #[test]
    fn get_since_sequence_only_returns_newer_entries() {
        let buffer = LogBuffer::new();
        for i in 0..5 {
            buffer.push(entry(&format!("m{i}")));
        }
        let newer = buffer.get_since_sequence(2, 10);
        assert_eq!(newer.len(), 2);
        assert_eq!(newer[0].message, "m3");
    }

    #[test]
    fn clear_empties_the_buffer() {
        let buffer = LogBuffer::new();
        buffer.push(entry("one"));
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
