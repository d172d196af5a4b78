//! Core statechart vocabulary.
//!
//! This module contains the data the engine works on:
//! - Event identity
//! - Guard predicates for choice transitions
//! - State kinds and the arena nodes of a chart
//! - The wait-activity completion tree
//! - The transition journal

pub(crate) mod activity;
pub(crate) mod event;
mod guard;
mod history;
pub(crate) mod state;

pub use activity::{ActivityId, WaitActivity};
pub use event::{Event, EventId};
pub use guard::Guard;
pub use history::{Journal, TransitionRecord};
pub use state::{RegionId, StateId, StateKind};
