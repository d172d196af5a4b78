//! Regions and the shared blueprint a chart is configured into.

use crate::builder::error::BuildError;
use crate::builder::states::{
    ChoiceState, FinalState, InitialState, LeaveState, NestState, SimpleState, SplitState,
    StateHandle, TaskWaitState, TransitionState, WaitState,
};
use crate::core::state::{Payload, RegionNode, StateNode};
use crate::core::{RegionId, StateId, StateKind};
use crate::engine::Chart;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// The chart under construction plus the errors found so far.
///
/// Once the chart is built the blueprint is sealed and every handle still
/// held by the application becomes inert.
pub(crate) struct Blueprint {
    pub(crate) chart: Chart,
    pub(crate) errors: Vec<BuildError>,
    pub(crate) sealed: bool,
}

pub(crate) type SharedBlueprint = Rc<RefCell<Blueprint>>;

impl Blueprint {
    pub(crate) fn shared(chart: Chart) -> SharedBlueprint {
        Rc::new(RefCell::new(Self {
            chart,
            errors: Vec::new(),
            sealed: false,
        }))
    }

    /// Apply a configuration change unless the chart was already built.
    pub(crate) fn update<R>(
        shared: &SharedBlueprint,
        operation: &str,
        f: impl FnOnce(&mut Blueprint) -> R,
    ) -> Option<R> {
        let mut blueprint = shared.borrow_mut();
        if blueprint.sealed {
            tracing::warn!("ignoring {} on a statechart that is already built", operation);
            return None;
        }
        Some(f(&mut blueprint))
    }

    pub(crate) fn add_region(&mut self, layer: u32, owner: Option<StateId>) -> RegionId {
        let id = RegionId(self.chart.regions.len());
        self.chart.regions.push(RegionNode {
            layer,
            owner,
            states: Vec::new(),
            initial: None,
            final_state: None,
        });
        id
    }
}

/// A region of a chart: the root region or one branch of a nest or split.
///
/// States are added through the region and returned as typed handles.
#[derive(Clone)]
pub struct Region {
    pub(crate) blueprint: SharedBlueprint,
    pub(crate) id: RegionId,
    pub(crate) layer: u32,
}

impl Region {
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Nesting depth of the region, 0 for the root.
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// The region's entry point. A region has exactly one.
    pub fn initial(&self, name: impl Into<String>) -> InitialState {
        InitialState {
            handle: self.add(name.into(), StateKind::Initial),
        }
    }

    /// The region's terminal state. A region has at most one.
    pub fn final_state(&self, name: impl Into<String>) -> FinalState {
        FinalState {
            handle: self.add(name.into(), StateKind::Final),
        }
    }

    /// A blocking state that reacts to registered events.
    pub fn state(&self, name: impl Into<String>) -> SimpleState {
        SimpleState {
            handle: self.add(name.into(), StateKind::Simple),
        }
    }

    /// A state that immediately takes its single transition.
    pub fn transition(&self, name: impl Into<String>) -> TransitionState {
        TransitionState {
            handle: self.add(name.into(), StateKind::Transition),
        }
    }

    /// A composite state running one inner region until it finishes.
    pub fn nest(&self, name: impl Into<String>) -> NestState {
        NestState {
            handle: self.add(name.into(), StateKind::Nest),
        }
    }

    /// A decision point that takes the first transition whose conditions pass.
    pub fn choice(&self, name: impl Into<String>) -> ChoiceState {
        ChoiceState {
            handle: self.add(name.into(), StateKind::Choice),
        }
    }

    /// A state blocked on an application-driven wait activity.
    pub fn wait(&self, name: impl Into<String>) -> WaitState {
        WaitState {
            handle: self.add(name.into(), StateKind::Wait),
        }
    }

    /// A state blocked on an awaited operation.
    pub fn task_wait(&self, name: impl Into<String>) -> TaskWaitState {
        TaskWaitState {
            handle: self.add(name.into(), StateKind::TaskWait),
        }
    }

    /// A composite state running several inner regions in parallel.
    pub fn split(&self, name: impl Into<String>) -> SplitState {
        SplitState {
            handle: self.add(name.into(), StateKind::Split),
        }
    }

    /// Exit point of a nested region, resolved by the enclosing composite.
    pub fn leave(&self, name: impl Into<String>) -> LeaveState {
        LeaveState {
            handle: self.add(name.into(), StateKind::Leave),
        }
    }

    fn add(&self, name: String, kind: StateKind) -> StateHandle {
        let region = self.id;
        let id = Blueprint::update(&self.blueprint, "adding a state", |blueprint| {
            let chart = &mut blueprint.chart;
            let id = StateId(chart.states.len());
            let backtrace = chart.diagnostics.capture_backtrace();

            let slot = match kind {
                StateKind::Initial => Some(chart.regions[region.0].initial),
                StateKind::Final => Some(chart.regions[region.0].final_state),
                _ => None,
            };
            match slot {
                Some(Some(existing)) => {
                    let label = chart.region_label(region);
                    let existing = chart.states[existing.0].name.clone();
                    let duplicate = name.clone();
                    blueprint.errors.push(if kind == StateKind::Initial {
                        BuildError::DuplicateInitialState {
                            region: label,
                            existing,
                            duplicate,
                        }
                    } else {
                        BuildError::DuplicateFinalState {
                            region: label,
                            existing,
                            duplicate,
                        }
                    });
                }
                Some(None) if kind == StateKind::Initial => {
                    chart.regions[region.0].initial = Some(id);
                }
                Some(None) => chart.regions[region.0].final_state = Some(id),
                None => {}
            }

            chart.regions[region.0].states.push(id);
            chart.states.push(StateNode {
                name: name.clone(),
                region,
                logs_enabled: false,
                backtrace,
                on_enter: Vec::new(),
                on_exit: Vec::new(),
                payload: Payload::for_kind(kind),
            });
            id
        });

        StateHandle::new(
            Rc::clone(&self.blueprint),
            id.unwrap_or(StateId(usize::MAX)),
            self.layer,
            name,
        )
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("id", &self.id)
            .field("layer", &self.layer)
            .finish()
    }
}

/// Setup of one inner region of a nest or split state.
///
/// `execute_exit` runs the exit protocol of the region's current state when
/// the composite is left. `execute_final` enters the region's final state
/// when the composite is left before the region finished. Both default to
/// true.
pub struct NestedRegion<'a> {
    pub(crate) setup: Box<dyn FnOnce(&Region) + 'a>,
    pub(crate) execute_exit: bool,
    pub(crate) execute_final: bool,
}

impl<'a> NestedRegion<'a> {
    /// Describe an inner region; `setup` runs once when it is attached.
    pub fn new(setup: impl FnOnce(&Region) + 'a) -> Self {
        Self {
            setup: Box::new(setup),
            execute_exit: true,
            execute_final: true,
        }
    }

    /// Whether a forced exit runs the exit protocol of this region's state.
    pub fn execute_exit(mut self, enabled: bool) -> Self {
        self.execute_exit = enabled;
        self
    }

    /// Whether a forced exit enters this region's final state.
    pub fn execute_final(mut self, enabled: bool) -> Self {
        self.execute_final = enabled;
        self
    }
}

impl fmt::Debug for NestedRegion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedRegion")
            .field("execute_exit", &self.execute_exit)
            .field("execute_final", &self.execute_final)
            .finish()
    }
}
