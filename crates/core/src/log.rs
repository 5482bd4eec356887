//! Bounded, newest-first activity log

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Default number of retained entries
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Severity / kind of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Info,
    Success,
    Error,
    Warning,
    Buy,
    Sell,
}

impl LogCategory {
    pub fn name(&self) -> &'static str {
        match self {
            LogCategory::Info => "info",
            LogCategory::Success => "success",
            LogCategory::Error => "error",
            LogCategory::Warning => "warning",
            LogCategory::Buy => "buy",
            LogCategory::Sell => "sell",
        }
    }

    pub fn is_trade(&self) -> bool {
        matches!(self, LogCategory::Buy | LogCategory::Sell)
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Immutable log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    id: u64,
    timestamp: DateTime<Local>,
    message: String,
    category: LogCategory,
}

impl LogEntry {
    pub fn new(id: u64, message: impl Into<String>, category: LogCategory) -> Self {
        Self::at(id, Local::now(), message, category)
    }

    pub fn at(
        id: u64,
        timestamp: DateTime<Local>,
        message: impl Into<String>,
        category: LogCategory,
    ) -> Self {
        Self {
            id,
            timestamp,
            message: message.into(),
            category,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> LogCategory {
        self.category
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.timestamp.format("%H:%M:%S"),
            self.category,
            self.message
        )
    }
}

/// Ring of the most recent entries, newest first.
///
/// Appends are O(1): the new entry goes to the front and the tail is
/// trimmed back to `capacity`.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: u64,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Capacity is clamped to at least one entry
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            next_id: 1,
        }
    }

    /// Insert at the head, evicting the oldest entries over capacity
    pub fn append(&mut self, entry: LogEntry) {
        self.next_id = self.next_id.max(entry.id.saturating_add(1));
        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Create an entry stamped now with the next id and append it
    pub fn record(&mut self, message: impl Into<String>, category: LogCategory) -> &LogEntry {
        let id = self.next_id;
        self.append(LogEntry::new(id, message, category));
        &self.entries[0]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    /// Entries newest-first
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let mut buffer = LogBuffer::new();
        buffer.record("first", LogCategory::Info);
        buffer.record("second", LogCategory::Success);

        let messages: Vec<&str> = buffer.iter().map(|e| e.message()).collect();
        assert_eq!(messages, vec!["second", "first"]);
        assert_eq!(buffer.latest().map(|e| e.category()), Some(LogCategory::Success));
    }

    #[test]
    fn test_evicts_oldest_over_capacity() {
        let mut buffer = LogBuffer::new();
        for i in 0..51 {
            buffer.record(format!("entry {}", i), LogCategory::Info);
        }

        assert_eq!(buffer.len(), DEFAULT_LOG_CAPACITY);
        assert_eq!(buffer.latest().map(|e| e.message()), Some("entry 50"));
        assert!(buffer.iter().all(|e| e.message() != "entry 0"));
        assert_eq!(buffer.iter().last().map(|e| e.message()), Some("entry 1"));
    }

    #[test]
    fn test_ids_monotonic_across_clear() {
        let mut buffer = LogBuffer::with_capacity(2);
        let first = buffer.record("a", LogCategory::Info).id();
        buffer.clear();
        assert!(buffer.is_empty());

        let second = buffer.record("b", LogCategory::Info).id();
        assert!(second > first);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut buffer = LogBuffer::with_capacity(0);
        buffer.record("a", LogCategory::Info);
        buffer.record("b", LogCategory::Info);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.len(), 1);
    }
}
