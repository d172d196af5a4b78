//! Property-based tests for the statechart engine.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use proptest::prelude::*;
use statechart::{Event, NestedRegion, StateKind, Statechart, StatechartBuilder, WaitActivity};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A split with one `Start -> Busy --event--> Final` branch per event, joining
/// into `Joined`. Returns the chart and the join counter.
fn fan_in(events: &[Event]) -> (Statechart, Rc<Cell<usize>>) {
    let joins = Rc::new(Cell::new(0));
    let counter = joins.clone();
    let chart = Statechart::new(|region| {
        let initial = region.initial("Initial");
        let split = region.split("Split");
        let joined = region.state("Joined");
        initial.transition().target(&split);

        let branches = events.iter().enumerate().map(|(index, event)| {
            NestedRegion::new(move |branch| {
                let initial = branch.initial(format!("Start{}", index));
                let busy = branch.state(format!("Busy{}", index));
                let done = branch.final_state(format!("Final{}", index));
                initial.transition().target(&busy);
                busy.event(event).target(&done);
            })
        });
        split
            .split(branches)
            .on_transition(move || counter.set(counter.get() + 1))
            .target(&joined);
    })
    .unwrap();
    (chart, joins)
}

fn shuffled_indices(max: usize) -> impl Strategy<Value = Vec<usize>> {
    (2..=max).prop_flat_map(|count| Just((0..count).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #[test]
    fn split_completion_is_commutative(order in shuffled_indices(5)) {
        let events: Vec<Event> = (0..order.len())
            .map(|index| Event::new(format!("done{}", index)))
            .collect();
        let (mut chart, joins) = fan_in(&events);
        chart.run();

        for (step, &index) in order.iter().enumerate() {
            chart.trigger(&events[index]);
            if step + 1 < order.len() {
                prop_assert_eq!(chart.current_state(), "Split");
                prop_assert_eq!(joins.get(), 0);
            }
        }

        prop_assert_eq!(chart.current_state(), "Joined");
        prop_assert_eq!(joins.get(), 1);
    }

    #[test]
    fn repeated_branch_events_do_not_complete_early(
        order in shuffled_indices(4),
        repeats in 1..4usize,
    ) {
        let events: Vec<Event> = (0..order.len())
            .map(|index| Event::new(format!("done{}", index)))
            .collect();
        let (mut chart, joins) = fan_in(&events);
        chart.run();

        let (last, rest) = order.split_last().unwrap();
        for &index in rest {
            for _ in 0..repeats {
                chart.trigger(&events[index]);
            }
        }
        prop_assert_eq!(joins.get(), 0);

        chart.trigger(&events[*last]);
        prop_assert_eq!(joins.get(), 1);
    }

    #[test]
    fn activity_completion_is_monotonic(
        children in 0..5usize,
        order in prop::collection::vec(0..6usize, 0..20),
    ) {
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let root = WaitActivity::new(move |_| counter.set(counter.get() + 1));
        let nodes: Vec<WaitActivity> = std::iter::once(root.clone())
            .chain((0..children).map(|_| root.split()))
            .collect();

        let mut seen_complete = false;
        let mut completed = vec![false; nodes.len()];
        for pick in order {
            let index = pick % nodes.len();
            nodes[index].complete();
            completed[index] = true;

            let now = root.is_completed();
            prop_assert!(!seen_complete || now);
            prop_assert_eq!(now, completed.iter().all(|done| *done));
            seen_complete = now;
            prop_assert!(fired.get() <= 1);
        }

        prop_assert_eq!(fired.get(), usize::from(seen_complete));
        if seen_complete {
            prop_assert!(root.complete());
            prop_assert_eq!(fired.get(), 1);
        }
    }

    #[test]
    fn choice_takes_the_first_passing_guard(guards in prop::collection::vec(any::<bool>(), 1..6)) {
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let choice = region.choice("Pick");
            let fallback = region.state("Fallback");
            initial.transition().target(&choice);
            for (index, &passes) in guards.iter().enumerate() {
                let target = region.state(format!("Option{}", index));
                choice.transition().condition(move || passes).target(&target);
            }
            choice.transition().target(&fallback);
        })
        .unwrap();

        chart.run();

        let expected = guards
            .iter()
            .position(|passes| *passes)
            .map(|index| format!("Option{}", index))
            .unwrap_or_else(|| "Fallback".to_string());
        prop_assert_eq!(chart.current_state(), expected.as_str());
    }

    #[test]
    fn trigger_leaves_the_chart_blocked(events in prop::collection::vec(0..3usize, 0..12)) {
        let names = ["ping", "pong", "reset"];
        let triggers: Vec<Event> = names.iter().map(|name| Event::new(*name)).collect();
        let mut chart = Statechart::new(|region| {
            let initial = region.initial("Initial");
            let ping = region.state("Ping");
            let relay = region.transition("Relay");
            let pong = region.state("Pong");
            let done = region.final_state("Done");
            initial.transition().target(&ping);
            ping.event(&triggers[0]).target(&relay);
            relay.transition().target(&pong);
            pong.event(&triggers[1]).target(&ping);
            pong.event(&triggers[2]).target(&done);
        })
        .unwrap();

        chart.run();
        for index in events {
            chart.trigger(&triggers[index]);
            let kind = chart.state_kind(chart.current_state_id()).unwrap();
            prop_assert!(kind.is_blocking() || kind == StateKind::Final);
        }
    }

    #[test]
    fn journal_never_exceeds_capacity(capacity in 1..8usize, rounds in 0..20usize) {
        let toggle = Event::new("toggle");
        let mut chart = StatechartBuilder::new()
            .journal(capacity)
            .build(|region| {
                let initial = region.initial("Initial");
                let on = region.state("On");
                let off = region.state("Off");
                initial.transition().target(&off);
                off.event(&toggle).target(&on);
                on.event(&toggle).target(&off);
            })
            .unwrap();

        chart.run();
        for _ in 0..rounds {
            chart.trigger(&toggle);
        }

        let journal = chart.journal().unwrap();
        prop_assert!(journal.len() <= capacity);
        prop_assert_eq!(journal.len(), (rounds + 1).min(capacity));
    }
}

#[test]
fn faults_never_stop_a_split() {
    let go = Event::new("go");
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut chart = Statechart::new(|region| {
        let initial = region.initial("Initial");
        let split = region.split("Split");
        let joined = region.state("Joined");
        initial.transition().target(&split);
        let entry = log.clone();
        split
            .split([
                NestedRegion::new(|branch| {
                    let initial = branch.initial("LeftStart");
                    let busy = branch.state("LeftBusy");
                    let done = branch.final_state("LeftFinal");
                    initial.transition().target(&busy);
                    busy.on_exit(|| panic!("left exit failed"));
                    busy.event(&go).target(&done);
                }),
                NestedRegion::new(|branch| {
                    let initial = branch.initial("RightStart");
                    let busy = branch.state("RightBusy");
                    let done = branch.final_state("RightFinal");
                    initial.transition().target(&busy);
                    busy.event(&go).target(&done);
                    done.on_enter(move || entry.borrow_mut().push("RightFinal"));
                }),
            ])
            .target(&joined);
    })
    .unwrap();

    chart.run();
    chart.trigger(&go);

    assert_eq!(chart.current_state(), "Joined");
    assert_eq!(*log.borrow(), vec!["RightFinal"]);
    assert_eq!(chart.take_faults().len(), 1);
}
