//! Statically detectable ways a valid chart can stall.

use crate::core::state::Payload;
use crate::core::{RegionId, StateId, StateKind};
use crate::engine::Chart;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// A configuration that is allowed but likely to stall the chart at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Hazard {
    #[error("Choice state '{state}' has no unconditional transition and may stall")]
    ChoiceWithoutFallback { state: String },

    #[error("Choice state '{state}' has no transitions and will stall")]
    ChoiceWithoutTransitions { state: String },

    #[error("Transition state '{state}' has no target and will stall")]
    UntargetedTransition { state: String },

    #[error("State '{state}' has no events and can never be left")]
    SimpleWithoutEvents { state: String },

    #[error("State '{state}' is unreachable from the initial state of {region}")]
    Unreachable { state: String, region: String },
}

pub(crate) fn find_hazards(chart: &Chart) -> Vec<Hazard> {
    let mut hazards = Vec::new();

    for node in &chart.states {
        let state = node.name.clone();
        match &node.payload {
            Payload::Choice { transitions } if transitions.is_empty() => {
                hazards.push(Hazard::ChoiceWithoutTransitions { state });
            }
            Payload::Choice { transitions } => {
                let fallback = transitions
                    .iter()
                    .any(|id| chart.transitions[id.0].guards.is_empty());
                if !fallback {
                    hazards.push(Hazard::ChoiceWithoutFallback { state });
                }
            }
            Payload::Transition {
                transition: Some(id),
            } if chart.transitions[id.0].target.is_none() => {
                hazards.push(Hazard::UntargetedTransition { state });
            }
            Payload::Simple { events } if events.is_empty() => {
                hazards.push(Hazard::SimpleWithoutEvents { state });
            }
            _ => {}
        }
    }

    hazards.extend(unreachable_states(chart));
    hazards
}

/// States no path of transitions reaches from their region's initial state.
/// A leave transition counts as an edge from the composite owning the leave.
fn unreachable_states(chart: &Chart) -> Vec<Hazard> {
    let mut edges: Vec<Vec<StateId>> = vec![Vec::new(); chart.states.len()];
    for transition in &chart.transitions {
        let Some(target) = transition.target else {
            continue;
        };
        let source = transition.source;
        let node = &chart.states[source.0];
        let from = if node.kind() == StateKind::Leave {
            chart.regions[node.region.0].owner
        } else {
            Some(source)
        };
        if let Some(from) = from {
            edges[from.0].push(target);
        }
    }

    let mut hazards = Vec::new();
    for (index, region) in chart.regions.iter().enumerate() {
        let id = RegionId(index);
        let Some(initial) = region.initial else {
            continue;
        };
        let mut seen = HashSet::from([initial]);
        let mut queue = VecDeque::from([initial]);
        while let Some(state) = queue.pop_front() {
            for &next in &edges[state.0] {
                if chart.states[next.0].region == id && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        for state in region.states.iter().filter(|state| !seen.contains(state)) {
            hazards.push(Hazard::Unreachable {
                state: chart.states[state.0].name.clone(),
                region: chart.region_label(id),
            });
        }
    }
    hazards
}
