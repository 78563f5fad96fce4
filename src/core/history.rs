//! Macrostep history tracking.
//!
//! Provides immutable tracking of configuration changes over time. Each
//! macrostep that changed the configuration leaves one record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single macrostep.
///
/// `from` and `to` hold the active leaf paths before and after the step.
///
/// # Example
///
/// ```rust
/// use parley::core::MacrostepRecord;
/// use chrono::Utc;
///
/// let record = MacrostepRecord {
///     event: "click".to_string(),
///     from: vec!["dm.idle".to_string()],
///     to: vec!["dm.init".to_string()],
///     microsteps: 1,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.microsteps, 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacrostepRecord {
    /// Name of the event that started the macrostep
    pub event: String,
    /// Active leaves before the macrostep
    pub from: Vec<String>,
    /// Active leaves after the macrostep
    pub to: Vec<String>,
    /// Number of microsteps taken, including eventless and raised ones
    pub microsteps: usize,
    /// When the macrostep completed
    pub timestamp: DateTime<Utc>,
}

/// Bounded, ordered history of macrosteps.
///
/// History is immutable - `record` returns a new history with the record
/// added. Once `capacity` records are held the oldest one is dropped.
///
/// # Example
///
/// ```rust
/// use parley::core::{History, MacrostepRecord};
/// use chrono::Utc;
///
/// let step = |from: &str, to: &str| MacrostepRecord {
///     event: "e".to_string(),
///     from: vec![from.to_string()],
///     to: vec![to.to_string()],
///     microsteps: 1,
///     timestamp: Utc::now(),
/// };
///
/// let history = History::new()
///     .record(step("idle", "init"))
///     .record(step("init", "menu"));
///
/// let path = history.get_path();
/// assert_eq!(path.len(), 3); // idle -> init -> menu
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct History {
    records: VecDeque<MacrostepRecord>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Create a new empty history with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a new empty history holding at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a macrostep, returning a new history.
    ///
    /// This does not mutate the existing history.
    pub fn record(&self, record: MacrostepRecord) -> Self {
        let mut records = self.records.clone();
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
        Self {
            records,
            capacity: self.capacity,
        }
    }

    /// Get the sequence of leaf sets traversed.
    ///
    /// Returns the `from` leaves of the first record, then the `to` leaves of
    /// each record.
    pub fn get_path(&self) -> Vec<&[String]> {
        let mut path = Vec::new();
        if let Some(first) = self.records.front() {
            path.push(first.from.as_slice());
        }
        for record in &self.records {
            path.push(record.to.as_slice());
        }
        path
    }

    /// Time between the first and last recorded macrostep.
    ///
    /// Returns `None` if there are no records.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.front(), self.records.back()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &MacrostepRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&MacrostepRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event: &str, from: &str, to: &str) -> MacrostepRecord {
        MacrostepRecord {
            event: event.to_string(),
            from: vec![from.to_string()],
            to: vec![to.to_string()],
            microsteps: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = History::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let history = History::new();
        let new_history = history.record(record("click", "idle", "init"));

        assert_eq!(history.len(), 0);
        assert_eq!(new_history.len(), 1);
    }

    #[test]
    fn get_path_returns_leaf_sequence() {
        let history = History::new()
            .record(record("click", "dm.idle", "dm.init"))
            .record(record("click", "dm.init", "dm.menu.prompt"));

        let path = history.get_path();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], ["dm.idle".to_string()]);
        assert_eq!(path[2], ["dm.menu.prompt".to_string()]);
    }

    #[test]
    fn capacity_drops_oldest_records() {
        let history = History::with_capacity(2)
            .record(record("a", "s0", "s1"))
            .record(record("b", "s1", "s2"))
            .record(record("c", "s2", "s3"));

        assert_eq!(history.len(), 2);
        let events: Vec<_> = history.records().map(|r| r.event.as_str()).collect();
        assert_eq!(events, vec!["b", "c"]);
    }

    #[test]
    fn zero_capacity_keeps_one_record() {
        let history = History::with_capacity(0).record(record("a", "x", "y"));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn single_record_has_duration_zero() {
        let history = History::new().record(record("a", "x", "y"));
        assert_eq!(history.duration(), Some(Duration::from_secs(0)));
    }

    #[test]
    fn history_serializes_correctly() {
        let history = History::new().record(record("click", "idle", "init"));

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: History = serde_json::from_str(&json).unwrap();

        assert_eq!(history.len(), deserialized.len());
        assert_eq!(history.last(), deserialized.last());
    }
}
