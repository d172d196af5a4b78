//! Typed handles over configured states.
//!
//! Each state kind has its own handle exposing only the operations that
//! kind supports. Handles are cheap to clone and stay valid for the whole
//! configuration; once the chart is built they become inert.

use crate::builder::error::BuildError;
use crate::builder::region::{Blueprint, NestedRegion, Region, SharedBlueprint};
use crate::builder::transition::{ChoiceTransition, Transition};
use crate::core::state::{Action, Branch, Payload, TaskFactory, TransitionId, TransitionNode, WaitSetup};
use crate::core::{Event, StateId, WaitActivity};
use futures::FutureExt;
use std::future::Future;
use std::rc::Rc;

/// Anything that names a state of a chart, used as a transition target.
pub trait StateRef {
    fn state_id(&self) -> StateId;
}

impl StateRef for StateId {
    fn state_id(&self) -> StateId {
        *self
    }
}

#[derive(Clone)]
pub(crate) struct StateHandle {
    blueprint: SharedBlueprint,
    id: StateId,
    layer: u32,
    name: Rc<str>,
}

impl Blueprint {
    pub(crate) fn add_transition(&mut self, source: StateId) -> TransitionId {
        let id = TransitionId(self.chart.transitions.len());
        let backtrace = self.chart.diagnostics.capture_backtrace();
        self.chart
            .transitions
            .push(TransitionNode::new(source, backtrace));
        id
    }
}

impl StateHandle {
    pub(crate) fn new(blueprint: SharedBlueprint, id: StateId, layer: u32, name: String) -> Self {
        Self {
            blueprint,
            id,
            layer,
            name: name.into(),
        }
    }

    pub(crate) fn id(&self) -> StateId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn update<R>(&self, operation: &str, f: impl FnOnce(&mut Blueprint) -> R) -> Option<R> {
        Blueprint::update(&self.blueprint, operation, f)
    }

    fn transition_handle(&self, id: Option<TransitionId>) -> Transition {
        Transition::new(Rc::clone(&self.blueprint), id)
    }

    pub(crate) fn set_logs_enabled(&self, enabled: bool) {
        self.update("logs_enabled", |blueprint| {
            blueprint.chart.states[self.id.0].logs_enabled = enabled;
        });
    }

    pub(crate) fn on_enter(&self, action: Action) {
        self.update("on_enter", |blueprint| {
            blueprint.chart.states[self.id.0].on_enter.push(action);
        });
    }

    pub(crate) fn on_exit(&self, action: Action) {
        self.update("on_exit", |blueprint| {
            blueprint.chart.states[self.id.0].on_exit.push(action);
        });
    }

    pub(crate) fn event(&self, event: &Event) -> Transition {
        let id = self.update("event", |blueprint| {
            let transition = blueprint.add_transition(self.id);
            let node = &mut blueprint.chart.states[self.id.0];
            if let Some(events) = node.payload.events_mut() {
                if events.contains_key(event) {
                    blueprint.errors.push(BuildError::DuplicateEvent {
                        state: node.name.clone(),
                        event: event.name().to_string(),
                    });
                } else {
                    events.insert(event.clone(), transition);
                }
            }
            transition
        });
        self.transition_handle(id)
    }

    /// The state's main transition, created on first use.
    pub(crate) fn main_transition(&self) -> Transition {
        let id = self.update("transition", |blueprint| {
            if let Some(existing) = blueprint.chart.states[self.id.0].payload.main_transition() {
                return existing;
            }
            let transition = blueprint.add_transition(self.id);
            match &mut blueprint.chart.states[self.id.0].payload {
                Payload::Initial { transition: slot }
                | Payload::Transition { transition: slot }
                | Payload::Leave { transition: slot }
                | Payload::Wait {
                    transition: slot, ..
                }
                | Payload::TaskWait {
                    transition: slot, ..
                } => *slot = Some(transition),
                Payload::Composite(composite) => composite.transition = Some(transition),
                Payload::Final | Payload::Simple { .. } | Payload::Choice { .. } => {}
            }
            transition
        });
        self.transition_handle(id)
    }

    pub(crate) fn choice_transition(&self) -> ChoiceTransition {
        let id = self.update("choice transition", |blueprint| {
            let transition = blueprint.add_transition(self.id);
            if let Payload::Choice { transitions } = &mut blueprint.chart.states[self.id.0].payload {
                transitions.push(transition);
            }
            transition
        });
        ChoiceTransition::from(self.transition_handle(id))
    }

    pub(crate) fn wait_setup(&self, setup: WaitSetup) -> Transition {
        self.update("waiting_for", |blueprint| {
            let node = &mut blueprint.chart.states[self.id.0];
            if let Payload::Wait { setup: slot, .. } = &mut node.payload {
                if slot.is_some() {
                    blueprint.errors.push(BuildError::SetupRedefined {
                        state: node.name.clone(),
                    });
                } else {
                    *slot = Some(setup);
                }
            }
        });
        self.main_transition()
    }

    pub(crate) fn task_factory(&self, factory: TaskFactory) -> Transition {
        self.update("waiting_for", |blueprint| {
            let node = &mut blueprint.chart.states[self.id.0];
            if let Payload::TaskWait { factory: slot, .. } = &mut node.payload {
                if slot.is_some() {
                    blueprint.errors.push(BuildError::SetupRedefined {
                        state: node.name.clone(),
                    });
                } else {
                    *slot = Some(factory);
                }
            }
        });
        self.main_transition()
    }

    /// Create the inner regions of a nest or split and run their setups.
    ///
    /// Setups run while the blueprint is unborrowed so they can configure
    /// their own regions freely.
    pub(crate) fn attach_regions(&self, regions: Vec<NestedRegion<'_>>) -> Transition {
        let first = self
            .update("nesting regions", |blueprint| {
                let Some(composite) = blueprint.chart.composite_mut(self.id) else {
                    return false;
                };
                composite.configured += 1;
                if composite.configured > 1 {
                    blueprint.errors.push(BuildError::NestedRegionRedefined {
                        state: self.name.to_string(),
                    });
                    return false;
                }
                true
            })
            .unwrap_or(false);

        if first {
            let layer = self.layer + 1;
            for nested in regions {
                let region = self.update("nesting regions", |blueprint| {
                    let region = blueprint.add_region(layer, Some(self.id));
                    if let Some(composite) = blueprint.chart.composite_mut(self.id) {
                        composite.branches.push(Branch {
                            region,
                            current: None,
                            execute_exit: nested.execute_exit,
                            execute_final: nested.execute_final,
                        });
                    }
                    region
                });
                if let Some(id) = region {
                    let region = Region {
                        blueprint: Rc::clone(&self.blueprint),
                        id,
                        layer,
                    };
                    (nested.setup)(&region);
                }
            }
        }

        self.main_transition()
    }
}

state_handle! {
    /// Entry point of a region. Its transition is taken as soon as the
    /// region starts.
    InitialState { on_exit, transition }
}

state_handle! {
    /// Terminal state of a region.
    FinalState { on_enter }
}

state_handle! {
    /// Blocking state that leaves on registered events.
    SimpleState { on_enter, on_exit, event }
}

state_handle! {
    /// State that takes its single transition as soon as it is entered.
    TransitionState { on_enter, on_exit, transition }
}

state_handle! {
    /// Exit point of a nested region. The enclosing nest or split takes the
    /// leave transition, whose target lives next to the composite.
    LeaveState { on_enter, transition }
}

state_handle! {
    /// Decision point: takes the first transition whose conditions pass.
    ChoiceState { on_enter, on_exit }
}

impl ChoiceState {
    /// Register a new guarded transition. Transitions are evaluated in
    /// registration order.
    pub fn transition(&self) -> ChoiceTransition {
        self.handle.choice_transition()
    }
}

state_handle! {
    /// State that blocks until an application-driven [`WaitActivity`] tree
    /// completes, or one of its events fires.
    WaitState { on_enter, on_exit, event }
}

impl WaitState {
    /// Set the callback that receives a fresh root activity on every entry.
    /// Returns the transition taken once the activity completes.
    pub fn waiting_for(&self, setup: impl FnMut(&WaitActivity) + 'static) -> Transition {
        self.handle.wait_setup(Box::new(setup))
    }
}

state_handle! {
    /// State that blocks until an awaited operation settles.
    TaskWaitState { on_enter, on_exit }
}

impl TaskWaitState {
    /// Set the factory that starts the awaited operation on every entry.
    /// Returns the transition taken once the operation settles.
    pub fn waiting_for<F, Fut>(&self, mut factory: F) -> Transition
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.handle
            .task_factory(Box::new(move || factory().boxed_local()))
    }
}

state_handle! {
    /// Composite state running one inner region.
    NestState { on_enter, on_exit, event }
}

impl NestState {
    /// Configure the inner region. Returns the transition taken once the
    /// region reaches its final state.
    pub fn nest(&self, setup: impl FnOnce(&Region)) -> Transition {
        self.nest_with(NestedRegion::new(setup))
    }

    /// Like [`nest`](Self::nest), with branch flags set on `region`.
    pub fn nest_with(&self, region: NestedRegion<'_>) -> Transition {
        self.handle.attach_regions(vec![region])
    }
}

state_handle! {
    /// Composite state running several inner regions in parallel.
    SplitState { on_enter, on_exit, event }
}

impl SplitState {
    /// Configure the inner regions. Returns the transition taken once every
    /// region has reached its final state.
    pub fn split<'a>(&self, regions: impl IntoIterator<Item = NestedRegion<'a>>) -> Transition {
        self.handle.attach_regions(regions.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildError;
    use crate::StatechartBuilder;

    #[test]
    fn duplicate_event_is_reported() {
        let event = Event::new("go");
        let result = StatechartBuilder::new().build(|region| {
            let initial = region.initial("Start");
            let idle = region.state("Idle");
            let done = region.final_state("Done");
            initial.transition().target(&idle);
            idle.event(&event).target(&done);
            idle.event(&event).target(&done);
        });

        let errors = result.unwrap_err().errors;
        assert!(errors.contains(&BuildError::DuplicateEvent {
            state: "Idle".to_string(),
            event: "go".to_string(),
        }));
    }

    #[test]
    fn nesting_twice_is_reported() {
        let result = StatechartBuilder::new().build(|region| {
            let initial = region.initial("Start");
            let nest = region.nest("Nest");
            let done = region.final_state("Done");
            initial.transition().target(&nest);
            let inner = |region: &Region| {
                let initial = region.initial("Inner");
                let done = region.final_state("InnerDone");
                initial.transition().target(&done);
            };
            nest.nest(inner).target(&done);
            nest.nest(inner);
        });

        let errors = result.unwrap_err().errors;
        assert_eq!(
            errors,
            vec![BuildError::NestedRegionRedefined {
                state: "Nest".to_string()
            }]
        );
    }

    #[test]
    fn waiting_for_twice_is_reported() {
        let result = StatechartBuilder::new().build(|region| {
            let initial = region.initial("Start");
            let wait = region.wait("Wait");
            let done = region.final_state("Done");
            initial.transition().target(&wait);
            wait.waiting_for(|activity| {
                activity.complete();
            })
            .target(&done);
            wait.waiting_for(|_| {});
        });

        let errors = result.unwrap_err().errors;
        assert_eq!(
            errors,
            vec![BuildError::SetupRedefined {
                state: "Wait".to_string()
            }]
        );
    }

    #[test]
    fn nested_regions_are_one_layer_deeper() {
        let layers = std::cell::RefCell::new(Vec::new());
        let _ = StatechartBuilder::new().build(|region| {
            layers.borrow_mut().push(region.layer());
            let split = region.split("Split");
            split.split([
                NestedRegion::new(|inner| layers.borrow_mut().push(inner.layer())),
                NestedRegion::new(|inner| {
                    layers.borrow_mut().push(inner.layer());
                    inner
                        .nest("Deep")
                        .nest(|deep| layers.borrow_mut().push(deep.layer()));
                }),
            ]);
        });

        assert_eq!(*layers.borrow(), vec![0, 1, 1, 2]);
    }

    #[test]
    fn handles_are_inert_after_build() {
        let leaked = std::cell::RefCell::new(None);
        let chart = StatechartBuilder::new()
            .build(|region| {
                let initial = region.initial("Start");
                let idle = region.state("Idle");
                initial.transition().target(&idle);
                *leaked.borrow_mut() = Some(region.clone());
            })
            .unwrap();

        let region = leaked.borrow_mut().take().unwrap();
        let extra = region.state("Extra");
        extra.on_enter(|| {});

        assert_eq!(extra.name(), "Extra");
        assert!(chart.find_state("Extra").is_none());
    }
}
