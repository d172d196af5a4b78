//! Fault isolation for application callbacks.
//!
//! Enter, exit and transition callbacks, guards, wait setups and awaited
//! tasks are application code. A panic in any of them is caught, turned
//! into a [`Fault`] record, logged, and the engine carries on with the next
//! callback and the next phase.

use crate::core::state::{Action, StateNode};
use crate::core::{Journal, TransitionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use uuid::Uuid;

/// The part of the engine a callback was running in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Enter,
    Exit,
    Transition,
    Guard,
    WaitSetup,
    Task,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
            Self::Transition => "transition",
            Self::Guard => "guard",
            Self::WaitSetup => "wait setup",
            Self::Task => "task",
        };
        f.write_str(name)
    }
}

/// A callback that panicked while the engine was running it.
#[derive(Clone, Debug, PartialEq, Error, Serialize, Deserialize)]
#[error("{phase} callback of '{state}' panicked: {message}")]
pub struct Fault {
    pub phase: Phase,
    /// State whose callback faulted; the source state for transitions
    pub state: String,
    pub target: Option<String>,
    pub event: Option<String>,
    pub message: String,
    /// Creation backtrace of the state or transition, when captured
    pub backtrace: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Run `f`, converting a panic into its message.
pub(crate) fn isolate<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Side channels of a chart: trace switches, faults and the journal.
pub(crate) struct Diagnostics {
    pub(crate) instance_id: Uuid,
    pub(crate) logs_enabled: bool,
    pub(crate) capture_backtraces: bool,
    pub(crate) fault_capacity: usize,
    pub(crate) faults: VecDeque<Fault>,
    pub(crate) journal: Option<Journal>,
}

impl Diagnostics {
    /// Same switches and instance id, with no faults or journal.
    pub(crate) fn detached(&self) -> Self {
        Self {
            instance_id: self.instance_id,
            logs_enabled: self.logs_enabled,
            capture_backtraces: self.capture_backtraces,
            fault_capacity: self.fault_capacity,
            faults: VecDeque::new(),
            journal: None,
        }
    }

    pub(crate) fn traced(&self, node: &StateNode) -> bool {
        self.logs_enabled || node.logs_enabled
    }

    pub(crate) fn report(&mut self, fault: Fault) {
        tracing::error!(
            chart = %self.instance_id,
            phase = %fault.phase,
            state = %fault.state,
            to = fault.target.as_deref().unwrap_or("-"),
            event = fault.event.as_deref().unwrap_or("-"),
            backtrace = fault.backtrace.as_deref().unwrap_or(""),
            "callback fault: {}",
            fault.message
        );

        if self.fault_capacity == 0 {
            return;
        }
        if self.faults.len() == self.fault_capacity {
            self.faults.pop_front();
        }
        self.faults.push_back(fault);
    }

    pub(crate) fn record_transition(
        &mut self,
        from: &StateNode,
        to: Option<&StateNode>,
        event: Option<&str>,
        layer: u32,
    ) {
        if let Some(journal) = self.journal.as_mut() {
            journal.record(TransitionRecord {
                chart: self.instance_id,
                from: from.name.clone(),
                to: to.map(|node| node.name.clone()),
                event: event.map(str::to_string),
                layer,
                timestamp: Utc::now(),
            });
        }
    }

    pub(crate) fn capture_backtrace(&self) -> Option<String> {
        self.capture_backtraces
            .then(|| std::backtrace::Backtrace::force_capture().to_string())
    }
}

/// Builds a [`Fault`] for one failing callback.
pub(crate) struct FaultSite<'a> {
    pub(crate) phase: Phase,
    pub(crate) state: &'a str,
    pub(crate) target: Option<&'a str>,
    pub(crate) event: Option<&'a str>,
    pub(crate) backtrace: Option<&'a str>,
}

impl FaultSite<'_> {
    pub(crate) fn fault(&self, message: String) -> Fault {
        Fault {
            phase: self.phase,
            state: self.state.to_string(),
            target: self.target.map(str::to_string),
            event: self.event.map(str::to_string),
            message,
            backtrace: self.backtrace.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// Run every action in order, isolating each one.
pub(crate) fn run_actions(
    actions: &mut [Action],
    site: &FaultSite<'_>,
    diagnostics: &mut Diagnostics,
) {
    for action in actions.iter_mut() {
        if let Err(message) = isolate(|| action()) {
            diagnostics.report(site.fault(message));
        }
    }
}
