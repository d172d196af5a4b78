//! Journal of committed transitions.
//!
//! The journal is a bounded diagnostic record of every transition the
//! engine commits, at any nesting layer. It is kept in memory only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

/// Record of a single committed transition.
///
/// # Example
///
/// ```rust
/// use statechart::TransitionRecord;
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let record = TransitionRecord {
///     chart: Uuid::new_v4(),
///     from: "Idle".to_string(),
///     to: Some("Running".to_string()),
///     event: Some("start".to_string()),
///     layer: 0,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.to.as_deref(), Some("Running"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Instance id of the chart that committed the transition
    pub chart: Uuid,
    /// Name of the state being left
    pub from: String,
    /// Name of the state being entered, `None` for side-effect-only transitions
    pub to: Option<String>,
    /// Name of the triggering event, `None` for automatic transitions
    pub event: Option<String>,
    /// Nesting layer of the source state
    pub layer: u32,
    /// When the transition was committed
    pub timestamp: DateTime<Utc>,
}

/// Ordered, bounded journal of transitions.
///
/// Once `capacity` records are stored the oldest record is dropped for
/// each new one.
///
/// # Example
///
/// ```rust
/// use statechart::{Journal, TransitionRecord};
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let chart = Uuid::new_v4();
/// let mut journal = Journal::with_capacity(8);
///
/// for (from, to) in [("Start", "Middle"), ("Middle", "End")] {
///     journal.record(TransitionRecord {
///         chart,
///         from: from.to_string(),
///         to: Some(to.to_string()),
///         event: None,
///         layer: 0,
///         timestamp: Utc::now(),
///     });
/// }
///
/// assert_eq!(journal.get_path(), vec!["Start", "Middle", "End"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Journal {
    capacity: usize,
    records: VecDeque<TransitionRecord>,
}

impl Journal {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record, evicting the oldest one when full.
    pub fn record(&mut self, record: TransitionRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Names of the states traversed, starting from the `from` state of the
    /// oldest retained record. Side-effect-only records are skipped.
    pub fn get_path(&self) -> Vec<&str> {
        let mut moves = self.records.iter().filter(|r| r.to.is_some());
        let mut path = Vec::new();
        if let Some(first) = moves.next() {
            path.push(first.from.as_str());
            path.extend(first.to.as_deref());
        }
        for record in moves {
            path.extend(record.to.as_deref());
        }
        path
    }

    /// Time between the oldest and newest retained records.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.front(), self.records.back()) {
            last.timestamp
                .signed_duration_since(first.timestamp)
                .to_std()
                .ok()
        } else {
            None
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
