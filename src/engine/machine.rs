//! Transition resolution and the enter/exit protocol.

use super::faults::{isolate, run_actions, FaultSite, Phase};
use super::{ActivitySignal, Chart};
use crate::core::state::{Payload, StateId, StateKind, TransitionId};
use crate::core::{Event, WaitActivity};
use std::rc::Rc;

pub(crate) fn event_name(event: Option<&Event>) -> &str {
    event.map(Event::name).unwrap_or("null")
}

impl Chart {
    /// Process `event` in `current` and keep advancing with no event until
    /// a state blocks. Returns the state the region rests on.
    pub(crate) fn run_to_completion(&mut self, mut current: StateId, event: Option<&Event>) -> StateId {
        let mut next = self.step(current, event);
        while let Some(state) = next {
            current = state;
            next = self.step(current, None);
        }
        current
    }

    /// Resolve one transition for `state` and commit it.
    ///
    /// Returns the new state when the region moved. Side-effect-only
    /// transitions and transitions targeting their own source run their
    /// callbacks and halt.
    pub(crate) fn step(&mut self, state: StateId, event: Option<&Event>) -> Option<StateId> {
        self.absorb_signals();

        let Some(transition) = self.resolve(state, event) else {
            let node = &self.states[state.0];
            if self.diagnostics.traced(node) {
                tracing::debug!(
                    chart = %self.diagnostics.instance_id,
                    kind = %node.kind(),
                    "'{}' : ## STOP ## '{}'",
                    event_name(event),
                    node.name
                );
            }
            return None;
        };

        let layer = self.layer_of(state);
        match self.transitions[transition.0].target {
            Some(target) if target != state => {
                self.exit(state);
                self.fire(transition, state, event);
                self.enter(target);
                self.diagnostics.record_transition(
                    &self.states[state.0],
                    Some(&self.states[target.0]),
                    event.map(Event::name),
                    layer,
                );
                Some(target)
            }
            _ => {
                self.fire(transition, state, event);
                self.diagnostics.record_transition(
                    &self.states[state.0],
                    None,
                    event.map(Event::name),
                    layer,
                );
                None
            }
        }
    }

    fn resolve(&mut self, state: StateId, event: Option<&Event>) -> Option<TransitionId> {
        match self.states[state.0].kind() {
            StateKind::Choice => return self.choose(state),
            StateKind::Nest | StateKind::Split => return self.resolve_composite(state, event),
            _ => {}
        }

        match &self.states[state.0].payload {
            Payload::Initial { transition } | Payload::Transition { transition } => *transition,
            Payload::Simple { events } => event.and_then(|event| events.get(event).copied()),
            Payload::Wait {
                events,
                transition,
                satisfied,
                ..
            } => match event.and_then(|event| events.get(event)) {
                Some(found) => Some(*found),
                None if *satisfied => *transition,
                None => None,
            },
            Payload::TaskWait {
                transition,
                completed,
                ..
            } => completed.then_some(*transition).flatten(),
            Payload::Final
            | Payload::Leave { .. }
            | Payload::Choice { .. }
            | Payload::Composite(_) => None,
        }
    }

    /// First choice transition, in registration order, whose guards pass.
    fn choose(&mut self, state: StateId) -> Option<TransitionId> {
        let Chart {
            states,
            transitions,
            diagnostics,
            ..
        } = self;
        let node = &states[state.0];
        let Payload::Choice {
            transitions: choices,
        } = &node.payload
        else {
            return None;
        };

        choices.iter().copied().find(|id| {
            let transition = &transitions[id.0];
            let site = FaultSite {
                phase: Phase::Guard,
                state: &node.name,
                target: transition.target.map(|target| states[target.0].name.as_str()),
                event: None,
                backtrace: transition.backtrace.as_deref(),
            };
            transition
                .guards
                .iter()
                .all(|guard| match isolate(|| guard.check()) {
                    Ok(passed) => passed,
                    Err(message) => {
                        diagnostics.report(site.fault(message));
                        false
                    }
                })
        })
    }

    fn fire(&mut self, transition: TransitionId, source: StateId, event: Option<&Event>) {
        let Chart {
            states,
            transitions,
            diagnostics,
            ..
        } = self;
        let transition = &mut transitions[transition.0];
        let source = &states[source.0];
        let target = transition.target.map(|target| states[target.0].name.as_str());

        if diagnostics.traced(source) {
            tracing::debug!(
                chart = %diagnostics.instance_id,
                kind = %source.kind(),
                "'{}' : '{}' -> '{}'",
                event_name(event),
                source.name,
                target.unwrap_or("only invokes on_transition")
            );
        }

        let site = FaultSite {
            phase: Phase::Transition,
            state: &source.name,
            target,
            event: event.map(Event::name),
            backtrace: transition.backtrace.as_deref(),
        };
        run_actions(&mut transition.actions, &site, diagnostics);
    }

    /// Make `state` the active state of its region.
    pub(crate) fn enter(&mut self, state: StateId) {
        self.reset_for_entry(state);

        {
            let Chart {
                states,
                diagnostics,
                ..
            } = self;
            let node = &mut states[state.0];
            if diagnostics.traced(node) {
                tracing::debug!(
                    chart = %diagnostics.instance_id,
                    kind = %node.kind(),
                    "Entering '{}'",
                    node.name
                );
            }
            let site = FaultSite {
                phase: Phase::Enter,
                state: &node.name,
                target: None,
                event: None,
                backtrace: node.backtrace.as_deref(),
            };
            run_actions(&mut node.on_enter, &site, diagnostics);
        }

        match self.states[state.0].kind() {
            StateKind::Wait => self.start_wait(state),
            StateKind::TaskWait => self.start_task(state),
            _ => {}
        }
    }

    /// Run the exit protocol of `state`, including its branches when it is
    /// a nest or split.
    pub(crate) fn exit(&mut self, state: StateId) {
        if self.states[state.0].kind().is_composite() {
            self.exit_branches(state);
        }

        let Chart {
            states,
            diagnostics,
            orphans,
            ..
        } = self;
        let node = &mut states[state.0];
        if diagnostics.traced(node) {
            tracing::debug!(
                chart = %diagnostics.instance_id,
                kind = %node.kind(),
                "Exiting '{}'",
                node.name
            );
        }

        match &mut node.payload {
            Payload::Wait {
                activity,
                satisfied,
                ..
            } => {
                *activity = None;
                *satisfied = false;
            }
            Payload::TaskWait { task, queue, .. } => {
                orphans.extend(task.take());
                queue.clear();
            }
            _ => {}
        }

        let site = FaultSite {
            phase: Phase::Exit,
            state: &node.name,
            target: None,
            event: None,
            backtrace: node.backtrace.as_deref(),
        };
        run_actions(&mut node.on_exit, &site, diagnostics);
    }

    fn reset_for_entry(&mut self, state: StateId) {
        let Chart {
            states, regions, ..
        } = self;
        match &mut states[state.0].payload {
            Payload::Wait {
                activity,
                satisfied,
                ..
            } => {
                *activity = None;
                *satisfied = false;
            }
            Payload::TaskWait {
                completed, queue, ..
            } => {
                *completed = false;
                queue.clear();
            }
            Payload::Composite(composite) => {
                composite.paused = false;
                for branch in &mut composite.branches {
                    branch.current = regions[branch.region.0].initial;
                }
            }
            _ => {}
        }
    }

    /// Hand a fresh root activity to the wait state's setup callback.
    fn start_wait(&mut self, state: StateId) {
        let inbox = Rc::clone(&self.inbox);
        let root = WaitActivity::new(move |activity| {
            inbox
                .borrow_mut()
                .push_back(ActivitySignal { state, activity });
        });

        let Chart {
            states,
            diagnostics,
            ..
        } = self;
        let node = &mut states[state.0];
        let Payload::Wait {
            setup, activity, ..
        } = &mut node.payload
        else {
            return;
        };
        *activity = Some(root.clone());

        let Some(setup) = setup.as_mut() else {
            return;
        };
        if let Err(message) = isolate(|| setup(&root)) {
            let site = FaultSite {
                phase: Phase::WaitSetup,
                state: &node.name,
                target: None,
                event: None,
                backtrace: node.backtrace.as_deref(),
            };
            diagnostics.report(site.fault(message));
        }
    }

    /// Start the awaited operation of a task-wait state.
    ///
    /// A factory that panics counts as an operation that settled at once.
    fn start_task(&mut self, state: StateId) {
        let Chart {
            states,
            diagnostics,
            orphans,
            ..
        } = self;
        let node = &mut states[state.0];
        let Payload::TaskWait {
            factory,
            task,
            completed,
            ..
        } = &mut node.payload
        else {
            return;
        };
        let Some(factory) = factory.as_mut() else {
            *completed = true;
            return;
        };

        match isolate(|| factory()) {
            Ok(future) => {
                if let Some(previous) = task.replace(future) {
                    orphans.push(previous);
                }
            }
            Err(message) => {
                *completed = true;
                let site = FaultSite {
                    phase: Phase::Task,
                    state: &node.name,
                    target: None,
                    event: None,
                    backtrace: node.backtrace.as_deref(),
                };
                diagnostics.report(site.fault(message));
            }
        }
    }

    /// Apply queued wait-activity completions. A completion whose wait
    /// state has since been left or re-entered is dropped.
    pub(crate) fn absorb_signals(&mut self) {
        let signals: Vec<ActivitySignal> = self.inbox.borrow_mut().drain(..).collect();
        for signal in signals {
            let Chart {
                states,
                diagnostics,
                ..
            } = self;
            let node = &mut states[signal.state.0];
            let traced = diagnostics.traced(node);
            if let Payload::Wait {
                activity: Some(activity),
                satisfied,
                ..
            } = &mut node.payload
            {
                if activity.id() == signal.activity {
                    *satisfied = true;
                    if traced {
                        tracing::debug!(
                            chart = %diagnostics.instance_id,
                            "Wait of '{}' completed",
                            node.name
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Event, Phase, Statechart, StatechartBuilder};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(log: &Log, line: &str) -> impl FnMut() + 'static {
        let log = log.clone();
        let line = line.to_string();
        move || log.borrow_mut().push(line.clone())
    }

    #[test]
    fn callbacks_run_exit_then_transition_then_enter() {
        let go = Event::new("go");
        let log: Log = Rc::default();
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let a = region.state("A");
            let b = region.state("B");
            initial.on_exit(recorder(&log, "exit Initial"));
            initial
                .transition()
                .on_transition(recorder(&log, "Initial -> A"))
                .target(&a);
            a.on_enter(recorder(&log, "enter A"))
                .on_exit(recorder(&log, "exit A"));
            a.event(&go)
                .on_transition(recorder(&log, "A -> B"))
                .target(&b);
            b.on_enter(recorder(&log, "enter B"));
        })
        .unwrap();

        chart.run();
        chart.trigger(&go);

        assert_eq!(
            *log.borrow(),
            vec![
                "exit Initial",
                "Initial -> A",
                "enter A",
                "exit A",
                "A -> B",
                "enter B"
            ]
        );
    }

    #[test]
    fn automatic_states_chain_until_blocked() {
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let first = region.transition("First");
            let second = region.transition("Second");
            let idle = region.state("Idle");
            initial.transition().target(&first);
            first.transition().target(&second);
            second.transition().target(&idle);
        })
        .unwrap();

        chart.run();
        assert_eq!(chart.current_state(), "Idle");
    }

    #[test]
    fn untargeted_transition_only_runs_side_effects() {
        let ping = Event::new("ping");
        let log: Log = Rc::default();
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let idle = region.state("Idle");
            initial.transition().target(&idle);
            idle.on_exit(recorder(&log, "exit Idle"));
            idle.event(&ping).on_transition(recorder(&log, "pong"));
        })
        .unwrap();

        chart.run();
        chart.trigger(&ping);
        chart.trigger(&ping);

        assert_eq!(chart.current_state(), "Idle");
        assert_eq!(*log.borrow(), vec!["pong", "pong"]);
    }

    #[test]
    fn choice_takes_first_passing_transition() {
        let log: Log = Rc::default();
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let choice = region.choice("Pick");
            let never = region.final_state("Never");
            let first = region.state("First");
            let second = region.state("Second");
            initial.transition().target(&choice);
            choice.transition().condition(|| false).target(&never);
            choice
                .transition()
                .condition(|| true)
                .on_transition(recorder(&log, "first"))
                .target(&first);
            choice
                .transition()
                .on_transition(recorder(&log, "second"))
                .target(&second);
        })
        .unwrap();

        chart.run();

        assert_eq!(chart.current_state(), "First");
        assert_eq!(*log.borrow(), vec!["first"]);
    }

    #[test]
    fn panicking_guard_counts_as_failed() {
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let choice = region.choice("Pick");
            let risky = region.state("Risky");
            let safe = region.state("Safe");
            initial.transition().target(&choice);
            choice
                .transition()
                .condition(|| panic!("guard exploded"))
                .target(&risky);
            choice.transition().target(&safe);
        })
        .unwrap();

        chart.run();

        assert_eq!(chart.current_state(), "Safe");
        let faults = chart.take_faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].phase, Phase::Guard);
        assert_eq!(faults[0].state, "Pick");
        assert_eq!(faults[0].target.as_deref(), Some("Risky"));
        assert_eq!(faults[0].message, "guard exploded");
    }

    #[test]
    fn faulting_callbacks_do_not_stop_the_chart() {
        let go = Event::new("go");
        let log: Log = Rc::default();
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let a = region.state("A");
            let b = region.state("B");
            initial.transition().target(&a);
            a.on_exit(|| panic!("exit failed"))
                .on_exit(recorder(&log, "second exit"));
            a.event(&go)
                .on_transition(|| panic!("transition failed"))
                .target(&b);
            b.on_enter(recorder(&log, "enter B"));
        })
        .unwrap();

        chart.run();
        chart.trigger(&go);

        assert_eq!(chart.current_state(), "B");
        assert_eq!(*log.borrow(), vec!["second exit", "enter B"]);

        let phases: Vec<Phase> = chart.faults().map(|fault| fault.phase).collect();
        assert_eq!(phases, vec![Phase::Exit, Phase::Transition]);
        let transition = chart.faults().nth(1).unwrap();
        assert_eq!(transition.event.as_deref(), Some("go"));
        assert_eq!(transition.target.as_deref(), Some("B"));
    }

    #[test]
    fn wait_state_leaves_once_activity_completes() {
        let held = Rc::new(RefCell::new(None));
        let slot = held.clone();
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let wait = region.wait("Loading");
            let done = region.final_state("Done");
            initial.transition().target(&wait);
            wait.waiting_for(move |activity| {
                *slot.borrow_mut() = Some(activity.split());
                activity.complete();
            })
            .target(&done);
        })
        .unwrap();

        chart.run();
        assert_eq!(chart.current_state(), "Loading");

        let child = held.borrow_mut().take().unwrap();
        assert!(child.complete());
        assert_eq!(chart.current_state(), "Loading");

        chart.process_completions();
        assert_eq!(chart.current_state(), "Done");
    }

    #[test]
    fn wait_state_completed_during_setup_leaves_immediately() {
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let wait = region.wait("Quick");
            let done = region.final_state("Done");
            initial.transition().target(&wait);
            wait.waiting_for(|activity| {
                activity.complete();
            })
            .target(&done);
        })
        .unwrap();

        chart.run();
        assert_eq!(chart.current_state(), "Done");
    }

    #[test]
    fn wait_state_events_leave_early() {
        let cancel = Event::new("cancel");
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let wait = region.wait("Loading");
            let done = region.final_state("Done");
            let cancelled = region.state("Cancelled");
            initial.transition().target(&wait);
            wait.waiting_for(|_| {}).target(&done);
            wait.event(&cancel).target(&cancelled);
        })
        .unwrap();

        chart.run();
        chart.trigger(&cancel);
        assert_eq!(chart.current_state(), "Cancelled");
    }

    #[test]
    fn journal_records_committed_transitions() {
        let go = Event::new("go");
        let mut chart = StatechartBuilder::new()
            .journal(16)
            .build(|region| {
                let initial = region.initial("Initial");
                let a = region.state("A");
                let b = region.final_state("B");
                initial.transition().target(&a);
                a.event(&go).target(&b);
            })
            .unwrap();

        chart.run();
        chart.trigger(&go);

        let journal = chart.journal().unwrap();
        assert_eq!(journal.get_path(), vec!["Initial", "A", "B"]);
        let last = journal.records().last().unwrap();
        assert_eq!(last.event.as_deref(), Some("go"));
        assert_eq!(last.chart, chart.instance_id());
    }

    #[test]
    fn captured_backtraces_reach_faults() {
        let mut chart = StatechartBuilder::new()
            .capture_backtraces(true)
            .build(|region| {
                let initial = region.initial("Initial");
                let a = region.state("A");
                initial.transition().target(&a);
                a.on_enter(|| panic!("enter failed"));
            })
            .unwrap();

        chart.run();

        let faults = chart.take_faults();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].backtrace.is_some());
    }
}
