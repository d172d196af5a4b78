//! Nested and parallel regions.
//!
//! A nest state owns one inner region and a split state owns several. Events
//! reach the branches in branch order, each branch running to completion
//! before the next one sees the event. When a composite must be left while a
//! branch is still waiting, wait states are force-completed and task states
//! hold the composite paused until their operations settle.

use super::Chart;
use crate::core::state::{Payload, StateId, StateKind, TransitionId};
use crate::core::Event;

impl Chart {
    pub(crate) fn resolve_composite(
        &mut self,
        state: StateId,
        event: Option<&Event>,
    ) -> Option<TransitionId> {
        let paused = self.composite(state)?.paused;
        if paused && !self.all_completed(state) {
            return None;
        }
        let unpausing = paused;
        if let Some(composite) = self.composite_mut(state) {
            composite.paused = false;
        }

        let own = event.and_then(|event| self.composite(state)?.events.get(event).copied());
        if let Some(transition) = own {
            if !unpausing && self.delay_force_complete(state, event) {
                return None;
            }
            return Some(transition);
        }

        if !unpausing {
            self.forward(state, event);
        }

        let composite = self.composite(state)?;
        let mut completed = true;
        let mut leave = None;
        for current in composite.branches.iter().map(|branch| branch.current) {
            match current.map(|current| (current, self.states[current.0].kind())) {
                Some((current, StateKind::Leave)) => {
                    leave = leave.or(Some(current));
                }
                Some((_, StateKind::Final)) => {}
                _ => completed = false,
            }
        }
        let transition = composite.transition;

        if let Some(leave) = leave {
            if !unpausing && self.delay_force_complete(state, None) {
                return None;
            }
            return self.states[leave.0].payload.main_transition();
        }

        completed.then_some(transition).flatten()
    }

    /// Deliver `event` to every branch in order, running each branch to
    /// completion.
    fn forward(&mut self, state: StateId, event: Option<&Event>) {
        let count = self.composite(state).map_or(0, |c| c.branches.len());
        for index in 0..count {
            let Some(current) = self
                .composite(state)
                .and_then(|composite| composite.branches[index].current)
            else {
                continue;
            };
            let rested = self.run_to_completion(current, event);
            if let Some(composite) = self.composite_mut(state) {
                composite.branches[index].current = Some(rested);
            }
        }
    }

    /// Prepare the branches of `state` for a forced exit.
    ///
    /// Wait states are force-completed. Unsettled task states queue `event`
    /// for replay and pause the composite. Nested composites are always
    /// visited. Returns true when the composite is now paused.
    pub(crate) fn delay_force_complete(&mut self, state: StateId, event: Option<&Event>) -> bool {
        let currents = self.branch_currents(state);
        let mut paused = false;

        for current in currents {
            match &mut self.states[current.0].payload {
                Payload::Wait { activity, .. } => {
                    if let Some(activity) = activity.take() {
                        activity.force_complete();
                    }
                }
                Payload::TaskWait {
                    completed, queue, ..
                } => {
                    if !*completed {
                        queue.push_back(event.cloned());
                        paused = true;
                    }
                }
                Payload::Composite(_) => {
                    if self.delay_force_complete(current, event) {
                        paused = true;
                    }
                }
                _ => {}
            }
        }

        if let Some(composite) = self.composite_mut(state) {
            composite.paused = paused;
        }
        paused
    }

    /// True when no task state anywhere below `state` is still running.
    pub(crate) fn all_completed(&self, state: StateId) -> bool {
        self.branch_currents(state)
            .into_iter()
            .all(|current| match &self.states[current.0].payload {
                Payload::TaskWait { completed, .. } => *completed,
                Payload::Composite(_) => self.all_completed(current),
                _ => true,
            })
    }

    /// Exit every branch of a composite that is being left.
    ///
    /// Branches flagged `execute_exit` run the exit protocol of their
    /// current state. Branches flagged `execute_final` that had not finished
    /// enter their region's final state.
    pub(crate) fn exit_branches(&mut self, state: StateId) {
        self.discard_queues(state);
        let branches: Vec<_> = match self.composite_mut(state) {
            Some(composite) => {
                composite.paused = false;
                composite
                    .branches
                    .iter()
                    .map(|b| (b.region, b.current, b.execute_exit, b.execute_final))
                    .collect()
            }
            None => return,
        };

        for (region, current, execute_exit, execute_final) in branches {
            let Some(current) = current else {
                continue;
            };
            if execute_exit {
                self.exit(current);
            }
            let finished = matches!(
                self.states[current.0].kind(),
                StateKind::Final | StateKind::Leave
            );
            if execute_final && !finished {
                if let Some(final_state) = self.regions[region.0].final_state {
                    self.enter(final_state);
                }
            }
        }
    }

    /// Drop events buffered by task states anywhere below `state`. They
    /// were buffered for a forced exit that is now happening.
    fn discard_queues(&mut self, state: StateId) {
        for current in self.branch_currents(state) {
            match &mut self.states[current.0].payload {
                Payload::TaskWait { queue, .. } => queue.clear(),
                Payload::Composite(_) => self.discard_queues(current),
                _ => {}
            }
        }
    }

    fn branch_currents(&self, state: StateId) -> Vec<StateId> {
        self.composite(state)
            .map(|composite| {
                composite
                    .branches
                    .iter()
                    .filter_map(|branch| branch.current)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Innermost-last list of the states currently active below and
    /// including `state`.
    pub(crate) fn active_below(&self, state: StateId, active: &mut Vec<StateId>) {
        active.push(state);
        for current in self.branch_currents(state) {
            self.active_below(current, active);
        }
    }
}
