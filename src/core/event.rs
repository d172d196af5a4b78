//! Event identity for triggering transitions.
//!
//! Events are created once during configuration and reused for the lifetime
//! of the process. Two events are equal only if they are the same event:
//! equality and hashing use the process-wide unique id, never the name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    /// Raw numeric value, useful for diagnostics.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque token that advances a statechart.
///
/// # Example
///
/// ```rust
/// use statechart::Event;
///
/// let start = Event::new("start");
/// let other_start = Event::new("start");
///
/// assert_eq!(start, start.clone());
/// assert_ne!(start, other_start); // same name, different identity
/// ```
#[derive(Clone)]
pub struct Event {
    id: EventId,
    name: Arc<str>,
}

impl Event {
    /// Create a new event with a fresh identity.
    pub fn new(name: impl Into<String>) -> Self {
        let id = EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            id,
            name: Arc::from(name.into()),
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    /// Display name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id.0)
            .field("name", &&*self.name)
            .finish()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
