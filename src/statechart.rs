//! The statechart driver.

use crate::builder::{ConfigurationError, Region, StateRef, StatechartBuilder};
use crate::config::Settings;
use crate::core::{Event, Journal, RegionId, StateId, StateKind};
use crate::engine::{Chart, Fault};
use crate::validation::Hazard;
use futures::future;
use futures::task::noop_waker_ref;
use std::collections::VecDeque;
use std::fmt;
use std::task::{Context, Poll};
use uuid::Uuid;

/// A built, validated statechart.
///
/// The chart starts paused on its root initial state. [`run`](Self::run)
/// starts it, [`trigger`](Self::trigger) feeds it events, and the task
/// methods settle awaited operations of task-wait states on the caller's
/// thread.
///
/// # Example
///
/// ```
/// use statechart::{Event, Statechart};
///
/// let next = Event::new("next");
/// let mut chart = Statechart::new(|region| {
///     let initial = region.initial("Initial");
///     let a = region.state("A");
///     let b = region.state("B");
///     initial.transition().target(&a);
///     a.event(&next).target(&b);
/// })
/// .unwrap();
///
/// chart.run();
/// assert_eq!(chart.current_state(), "A");
///
/// chart.trigger(&next);
/// assert_eq!(chart.current_state(), "B");
///
/// // B does not react to the event
/// chart.trigger(&next);
/// assert_eq!(chart.current_state(), "B");
/// ```
pub struct Statechart {
    chart: Chart,
    root: RegionId,
    current: StateId,
    running: bool,
    deferred: VecDeque<StateId>,
    hazards: Vec<Hazard>,
    settings: Settings,
}

impl Statechart {
    /// Configure and build a chart with default [`Settings`].
    pub fn new(setup: impl FnOnce(&Region)) -> Result<Self, ConfigurationError> {
        StatechartBuilder::new().build(setup)
    }

    /// Start a [`StatechartBuilder`] to configure settings before building.
    pub fn builder() -> StatechartBuilder {
        StatechartBuilder::new()
    }

    pub(crate) fn new_validated(
        chart: Chart,
        root: RegionId,
        hazards: Vec<Hazard>,
        settings: Settings,
    ) -> Self {
        let current = chart.regions[root.0].initial.unwrap_or(StateId(0));
        Self {
            chart,
            root,
            current,
            running: false,
            deferred: VecDeque::new(),
            hazards,
            settings,
        }
    }

    /// Identifier attached to every log line and fault of this chart.
    pub fn instance_id(&self) -> Uuid {
        self.chart.diagnostics.instance_id
    }

    /// Settings the chart was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// True between [`run`](Self::run) and [`pause`](Self::pause).
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start or resume the chart and advance it until it blocks.
    ///
    /// Task settlements observed while the chart was paused are replayed
    /// afterwards, in the order they were observed.
    pub fn run(&mut self) {
        self.running = true;
        tracing::debug!(chart = %self.instance_id(), "running from '{}'", self.current_state());
        self.move_next(None);

        while self.running {
            let Some(state) = self.deferred.pop_front() else {
                break;
            };
            self.resume(state);
        }
    }

    /// Stop processing events. Events triggered while paused are dropped.
    pub fn pause(&mut self) {
        self.running = false;
        tracing::debug!(chart = %self.instance_id(), "paused in '{}'", self.current_state());
    }

    /// Point the root region back at its initial state.
    ///
    /// No exit callbacks run and the running flag is unchanged; the initial
    /// transition is taken on the next [`run`](Self::run) or event.
    pub fn reset(&mut self) {
        if let Some(initial) = self.chart.regions[self.root.0].initial {
            self.current = initial;
        }
        self.deferred.clear();
        tracing::debug!(chart = %self.instance_id(), "reset to '{}'", self.current_state());
    }

    /// Process `event` and run to completion. Ignored while paused.
    pub fn trigger(&mut self, event: &Event) {
        if !self.running {
            tracing::debug!(
                chart = %self.instance_id(),
                "ignoring '{}' while paused",
                event.name()
            );
            return;
        }
        self.process_completions();
        self.move_next(Some(event));
    }

    /// Apply wait-activity completions signalled since the last step.
    pub fn process_completions(&mut self) {
        if !self.chart.has_pending_signals() {
            return;
        }
        if self.running {
            self.move_next(None);
        } else {
            self.chart.absorb_signals();
        }
    }

    fn move_next(&mut self, event: Option<&Event>) {
        self.current = self.chart.run_to_completion(self.current, event);
    }

    /// Poll every outstanding awaited operation and apply the ones that
    /// settled. Returns `Ready` once no operation is outstanding.
    pub fn poll_tasks(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.drive(cx);
        if self.chart.pending_tasks() == 0 {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }

    /// Drive the chart until no awaited operation is outstanding.
    pub async fn run_tasks(&mut self) {
        future::poll_fn(|cx| self.poll_tasks(cx)).await
    }

    /// Apply every awaited operation that can settle without waiting.
    /// Returns the number of task states that settled.
    pub fn settle_ready(&mut self) -> usize {
        let mut cx = Context::from_waker(noop_waker_ref());
        self.drive(&mut cx)
    }

    /// Number of awaited operations that have not settled yet.
    pub fn pending_tasks(&self) -> usize {
        self.chart.pending_tasks()
    }

    /// Replay the resumptions of a settled task state. A state that was
    /// left or restarted since it settled has nothing to replay.
    fn resume(&mut self, state: StateId) {
        if !self.active_states().contains(&state) {
            tracing::trace!(
                chart = %self.instance_id(),
                "'{}' is no longer active, dropping its resumptions",
                self.chart.state(state).name
            );
            return;
        }
        for event in self.chart.take_resumptions(state) {
            self.move_next(event.as_ref());
        }
    }

    fn drive(&mut self, cx: &mut Context<'_>) -> usize {
        let mut total = 0;
        loop {
            self.process_completions();
            let settled = self.chart.poll_tasks(cx);
            if settled.is_empty() {
                return total;
            }
            total += settled.len();
            for state in settled {
                if self.running {
                    self.resume(state);
                } else {
                    self.deferred.push_back(state);
                }
            }
        }
    }

    /// Name of the current state of the root region.
    pub fn current_state(&self) -> &str {
        &self.chart.state(self.current).name
    }

    /// Id of the state the root region rests on.
    pub fn current_state_id(&self) -> StateId {
        self.current
    }

    /// Every active state, outermost first, with the branches of nest and
    /// split states in branch order.
    pub fn active_states(&self) -> Vec<StateId> {
        let mut active = Vec::new();
        self.chart.active_below(self.current, &mut active);
        active
    }

    /// Names of [`active_states`](Self::active_states), in the same order.
    pub fn active_state_names(&self) -> Vec<&str> {
        self.active_states()
            .into_iter()
            .map(|id| self.chart.state(id).name.as_str())
            .collect()
    }

    /// True when `state` is active in any region of the chart.
    pub fn is_active(&self, state: &impl StateRef) -> bool {
        self.active_states().contains(&state.state_id())
    }

    /// Display name of `state`, or `None` for an id from another chart.
    pub fn state_name(&self, state: StateId) -> Option<&str> {
        self.chart.states.get(state.0).map(|node| node.name.as_str())
    }

    /// Kind of `state`, or `None` for an id from another chart.
    pub fn state_kind(&self, state: StateId) -> Option<StateKind> {
        self.chart.states.get(state.0).map(|node| node.kind())
    }

    /// First state with the given name, in creation order.
    pub fn find_state(&self, name: &str) -> Option<StateId> {
        self.chart
            .states
            .iter()
            .position(|node| node.name == name)
            .map(StateId)
    }

    /// Whether trace lines are emitted for every state.
    pub fn logs_enabled(&self) -> bool {
        self.chart.diagnostics.logs_enabled
    }

    /// Turn trace lines for every state on or off.
    pub fn set_logs_enabled(&mut self, enabled: bool) {
        self.chart.diagnostics.logs_enabled = enabled;
        self.settings.logs_enabled = enabled;
    }

    /// Stall hazards found when the chart was built.
    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    /// Retained callback faults, oldest first.
    pub fn faults(&self) -> impl Iterator<Item = &Fault> {
        self.chart.diagnostics.faults.iter()
    }

    /// Drain the retained fault records, oldest first.
    pub fn take_faults(&mut self) -> Vec<Fault> {
        self.chart.diagnostics.faults.drain(..).collect()
    }

    /// The transition journal, when enabled in [`Settings`].
    pub fn journal(&self) -> Option<&Journal> {
        self.chart.diagnostics.journal.as_ref()
    }
}

impl fmt::Debug for Statechart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statechart")
            .field("instance_id", &self.instance_id())
            .field("current", &self.current_state())
            .field("running", &self.running)
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}
