//! Run-to-completion engine.
//!
//! This module is the imperative shell around the chart arena: it resolves
//! transitions, runs enter/exit/transition callbacks in strict order, drives
//! nested and parallel regions, implements the forced-exit protocol and
//! bridges awaited tasks back onto the owning thread.
//!
//! # Key Concepts
//!
//! - **Step**: one resolution of one state, followed by exit, transition
//!   side effects and enter when the state moves
//! - **Run to completion**: steps repeated with no event until the current
//!   state blocks
//! - **Faults**: every callback is isolated; a panicking callback is
//!   recorded and the engine carries on

mod composite;
pub(crate) mod faults;
mod machine;
mod tasks;

pub use faults::{Fault, Phase};

use crate::core::state::{Composite, Payload, RegionNode, StateNode, TaskFuture, TransitionNode};
use crate::core::{ActivityId, RegionId, StateId};
use faults::Diagnostics;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Completion of a wait state's root activity, queued until the engine
/// applies it on its own thread of control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ActivitySignal {
    pub(crate) state: StateId,
    pub(crate) activity: ActivityId,
}

pub(crate) type Inbox = Rc<RefCell<VecDeque<ActivitySignal>>>;

/// Arena of states, regions and transitions plus the chart's side channels.
pub(crate) struct Chart {
    pub(crate) states: Vec<StateNode>,
    pub(crate) regions: Vec<RegionNode>,
    pub(crate) transitions: Vec<TransitionNode>,
    pub(crate) inbox: Inbox,
    pub(crate) diagnostics: Diagnostics,
    /// Futures of task states that were re-entered before settling.
    pub(crate) orphans: Vec<TaskFuture>,
}

impl Chart {
    pub(crate) fn new(diagnostics: Diagnostics) -> Self {
        Self {
            states: Vec::new(),
            regions: Vec::new(),
            transitions: Vec::new(),
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            diagnostics,
            orphans: Vec::new(),
        }
    }

    pub(crate) fn state(&self, id: StateId) -> &StateNode {
        &self.states[id.0]
    }

    pub(crate) fn layer_of(&self, id: StateId) -> u32 {
        self.regions[self.states[id.0].region.0].layer
    }

    pub(crate) fn composite(&self, id: StateId) -> Option<&Composite> {
        match &self.states[id.0].payload {
            Payload::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    pub(crate) fn composite_mut(&mut self, id: StateId) -> Option<&mut Composite> {
        match &mut self.states[id.0].payload {
            Payload::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    /// Human-readable name of a region for error messages.
    pub(crate) fn region_label(&self, id: RegionId) -> String {
        let Some(owner) = self.regions[id.0].owner else {
            return "root region".to_string();
        };
        let index = self
            .composite(owner)
            .and_then(|composite| composite.branches.iter().position(|b| b.region == id))
            .unwrap_or(0);
        format!("region {} of '{}'", index + 1, self.states[owner.0].name)
    }

    pub(crate) fn has_pending_signals(&self) -> bool {
        !self.inbox.borrow().is_empty()
    }
}
