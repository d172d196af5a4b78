//! Handles for configuring transitions.

use crate::builder::error::BuildError;
use crate::builder::region::{Blueprint, SharedBlueprint};
use crate::builder::states::StateRef;
use crate::core::state::TransitionId;
use crate::core::Guard;
use std::fmt;

/// A transition under construction.
///
/// Side effects run in registration order every time the transition is
/// taken. A transition without a target only runs its side effects.
///
/// # Example
///
/// ```
/// use statechart::{Event, Statechart};
///
/// let go = Event::new("go");
/// let chart = Statechart::new(|region| {
///     let initial = region.initial("Start");
///     let idle = region.state("Idle");
///     let done = region.final_state("Done");
///
///     initial.transition().target(&idle);
///     idle.event(&go)
///         .on_transition(|| println!("leaving Idle"))
///         .target(&done);
/// })
/// .unwrap();
///
/// assert_eq!(chart.current_state(), "Start");
/// ```
#[derive(Clone)]
pub struct Transition {
    blueprint: SharedBlueprint,
    id: Option<TransitionId>,
}

impl Transition {
    pub(crate) fn new(blueprint: SharedBlueprint, id: Option<TransitionId>) -> Self {
        Self { blueprint, id }
    }

    fn update(&self, operation: &str, f: impl FnOnce(&mut Blueprint, TransitionId)) {
        if let Some(id) = self.id {
            Blueprint::update(&self.blueprint, operation, |blueprint| f(blueprint, id));
        }
    }

    /// Add a side effect run when the transition is taken.
    pub fn on_transition(self, action: impl FnMut() + 'static) -> Self {
        self.update("on_transition", |blueprint, id| {
            blueprint.chart.transitions[id.0]
                .actions
                .push(Box::new(action));
        });
        self
    }

    /// Set the state the transition moves to. A target can only be set
    /// once.
    pub fn target(self, state: &impl StateRef) -> Self {
        let target = state.state_id();
        self.update("target", |blueprint, id| {
            let transition = &mut blueprint.chart.transitions[id.0];
            if transition.target.is_some() {
                let source = &blueprint.chart.states[transition.source.0];
                blueprint.errors.push(BuildError::TargetRedefined {
                    state: source.name.clone(),
                });
            }
            transition.target = Some(target);
        });
        self
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition").field("id", &self.id).finish()
    }
}

/// A transition of a choice state, which may carry guard conditions.
///
/// The transition is taken only when every condition holds. Conditions are
/// checked in registration order and stop at the first failure.
#[derive(Clone, Debug)]
pub struct ChoiceTransition {
    inner: Transition,
}

impl From<Transition> for ChoiceTransition {
    fn from(inner: Transition) -> Self {
        Self { inner }
    }
}

impl ChoiceTransition {
    pub fn condition(self, predicate: impl Fn() -> bool + 'static) -> Self {
        self.inner.update("condition", |blueprint, id| {
            blueprint.chart.transitions[id.0]
                .guards
                .push(Guard::new(predicate));
        });
        self
    }

    pub fn on_transition(self, action: impl FnMut() + 'static) -> Self {
        Self {
            inner: self.inner.on_transition(action),
        }
    }

    pub fn target(self, state: &impl StateRef) -> Self {
        Self {
            inner: self.inner.target(state),
        }
    }
}
