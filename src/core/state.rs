//! State identity, state kinds and the arena nodes backing a chart.
//!
//! Every state, region and transition of a chart lives in a dense arena and
//! is referenced by index. Regions hold lists of state indices and states
//! reference their targets by [`StateId`], so the nesting graph never forms
//! ownership cycles.

use crate::core::activity::WaitActivity;
use crate::core::event::Event;
use crate::core::guard::Guard;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Index of a state inside its chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state#{}", self.0)
    }
}

/// Index of a region inside its chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub(crate) usize);

/// Index of a transition inside its chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TransitionId(pub(crate) usize);

/// The closed set of state kinds a chart can contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    Initial,
    Final,
    Simple,
    Transition,
    Choice,
    Wait,
    TaskWait,
    Nest,
    Split,
    Leave,
}

impl StateKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::Final => "Final",
            Self::Simple => "Simple",
            Self::Transition => "Transition",
            Self::Choice => "Choice",
            Self::Wait => "Wait",
            Self::TaskWait => "TaskWait",
            Self::Nest => "Nest",
            Self::Split => "Split",
            Self::Leave => "Leave",
        }
    }

    /// True for the kinds that hold the chart until something external
    /// happens.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::Simple | Self::Wait | Self::TaskWait | Self::Nest | Self::Split
        )
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Nest | Self::Split)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) type Action = Box<dyn FnMut()>;
pub(crate) type TaskFuture = LocalBoxFuture<'static, ()>;
pub(crate) type TaskFactory = Box<dyn FnMut() -> TaskFuture>;
pub(crate) type WaitSetup = Box<dyn FnMut(&WaitActivity)>;

pub(crate) struct TransitionNode {
    pub(crate) source: StateId,
    pub(crate) target: Option<StateId>,
    pub(crate) guards: Vec<Guard>,
    pub(crate) actions: Vec<Action>,
    pub(crate) backtrace: Option<String>,
}

impl TransitionNode {
    pub(crate) fn new(source: StateId, backtrace: Option<String>) -> Self {
        Self {
            source,
            target: None,
            guards: Vec::new(),
            actions: Vec::new(),
            backtrace,
        }
    }
}

pub(crate) struct StateNode {
    pub(crate) name: String,
    pub(crate) region: RegionId,
    pub(crate) logs_enabled: bool,
    pub(crate) backtrace: Option<String>,
    pub(crate) on_enter: Vec<Action>,
    pub(crate) on_exit: Vec<Action>,
    pub(crate) payload: Payload,
}

impl StateNode {
    pub(crate) fn kind(&self) -> StateKind {
        self.payload.kind()
    }
}

/// Inner-region record of a nest or split state.
pub(crate) struct Branch {
    pub(crate) region: RegionId,
    pub(crate) current: Option<StateId>,
    pub(crate) execute_exit: bool,
    pub(crate) execute_final: bool,
}

pub(crate) struct Composite {
    pub(crate) split: bool,
    pub(crate) events: HashMap<Event, TransitionId>,
    pub(crate) branches: Vec<Branch>,
    pub(crate) transition: Option<TransitionId>,
    pub(crate) configured: usize,
    pub(crate) paused: bool,
}

pub(crate) enum Payload {
    Initial {
        transition: Option<TransitionId>,
    },
    Final,
    Simple {
        events: HashMap<Event, TransitionId>,
    },
    Transition {
        transition: Option<TransitionId>,
    },
    Choice {
        transitions: Vec<TransitionId>,
    },
    Wait {
        events: HashMap<Event, TransitionId>,
        setup: Option<WaitSetup>,
        transition: Option<TransitionId>,
        activity: Option<WaitActivity>,
        satisfied: bool,
    },
    TaskWait {
        factory: Option<TaskFactory>,
        transition: Option<TransitionId>,
        task: Option<TaskFuture>,
        completed: bool,
        queue: VecDeque<Option<Event>>,
    },
    Leave {
        transition: Option<TransitionId>,
    },
    Composite(Composite),
}

impl Payload {
    pub(crate) fn kind(&self) -> StateKind {
        match self {
            Self::Initial { .. } => StateKind::Initial,
            Self::Final => StateKind::Final,
            Self::Simple { .. } => StateKind::Simple,
            Self::Transition { .. } => StateKind::Transition,
            Self::Choice { .. } => StateKind::Choice,
            Self::Wait { .. } => StateKind::Wait,
            Self::TaskWait { .. } => StateKind::TaskWait,
            Self::Leave { .. } => StateKind::Leave,
            Self::Composite(composite) if composite.split => StateKind::Split,
            Self::Composite(_) => StateKind::Nest,
        }
    }

    pub(crate) fn for_kind(kind: StateKind) -> Self {
        match kind {
            StateKind::Initial => Self::Initial { transition: None },
            StateKind::Final => Self::Final,
            StateKind::Simple => Self::Simple {
                events: HashMap::new(),
            },
            StateKind::Transition => Self::Transition { transition: None },
            StateKind::Choice => Self::Choice {
                transitions: Vec::new(),
            },
            StateKind::Wait => Self::Wait {
                events: HashMap::new(),
                setup: None,
                transition: None,
                activity: None,
                satisfied: false,
            },
            StateKind::TaskWait => Self::TaskWait {
                factory: None,
                transition: None,
                task: None,
                completed: false,
                queue: VecDeque::new(),
            },
            StateKind::Leave => Self::Leave { transition: None },
            StateKind::Nest | StateKind::Split => Self::Composite(Composite {
                split: kind == StateKind::Split,
                events: HashMap::new(),
                branches: Vec::new(),
                transition: None,
                configured: 0,
                paused: false,
            }),
        }
    }

    /// Event table of the kinds that accept discrete events.
    pub(crate) fn events(&self) -> Option<&HashMap<Event, TransitionId>> {
        match self {
            Self::Simple { events } | Self::Wait { events, .. } => Some(events),
            Self::Composite(composite) => Some(&composite.events),
            _ => None,
        }
    }

    pub(crate) fn events_mut(&mut self) -> Option<&mut HashMap<Event, TransitionId>> {
        match self {
            Self::Simple { events } | Self::Wait { events, .. } => Some(events),
            Self::Composite(composite) => Some(&mut composite.events),
            _ => None,
        }
    }

    /// The single unconditional or completion transition of a state, if its
    /// kind has one.
    pub(crate) fn main_transition(&self) -> Option<TransitionId> {
        match self {
            Self::Initial { transition }
            | Self::Transition { transition }
            | Self::Leave { transition }
            | Self::Wait { transition, .. }
            | Self::TaskWait { transition, .. } => *transition,
            Self::Composite(composite) => composite.transition,
            Self::Final | Self::Simple { .. } | Self::Choice { .. } => None,
        }
    }

    /// Every transition registered on this state, in registration-stable
    /// order: main transition first, then choices, then events.
    pub(crate) fn transitions(&self) -> Vec<TransitionId> {
        let mut all: Vec<TransitionId> = self.main_transition().into_iter().collect();
        if let Self::Choice { transitions } = self {
            all.extend(transitions.iter().copied());
        }
        if let Some(events) = self.events() {
            let mut by_event: Vec<_> = events.iter().collect();
            by_event.sort_by_key(|(event, _)| event.id());
            all.extend(by_event.into_iter().map(|(_, id)| *id));
        }
        all
    }
}

pub(crate) struct RegionNode {
    pub(crate) layer: u32,
    pub(crate) owner: Option<StateId>,
    pub(crate) states: Vec<StateId>,
    pub(crate) initial: Option<StateId>,
    pub(crate) final_state: Option<StateId>,
}
