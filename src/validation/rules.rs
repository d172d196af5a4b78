//! Structural rules a chart must satisfy before it can run.

use crate::builder::BuildError;
use crate::core::state::{Payload, StateNode};
use crate::core::{RegionId, StateId, StateKind};
use crate::engine::Chart;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<BuildError>>;

fn require(condition: bool, error: impl FnOnce() -> BuildError) -> Check {
    if condition {
        Validation::success(())
    } else {
        Validation::fail(error())
    }
}

/// Validate the whole chart.
///
/// Errors recorded while the chart was configured come first, followed by
/// every structural problem found. Returns `Validation::Success(())` only
/// when nothing is wrong.
pub(crate) fn validate(chart: &Chart, recorded: Vec<BuildError>) -> Check {
    let mut checks: Vec<Check> = recorded.into_iter().map(Validation::fail).collect();

    for (index, region) in chart.regions.iter().enumerate() {
        let id = RegionId(index);
        checks.push(require(region.initial.is_some(), || {
            BuildError::MissingInitialState {
                region: chart.region_label(id),
            }
        }));
    }

    for (index, node) in chart.states.iter().enumerate() {
        checks.extend(check_state(chart, StateId(index), node));
    }

    Validation::all_vec(checks).map(|_| ())
}

fn check_state(chart: &Chart, id: StateId, node: &StateNode) -> Vec<Check> {
    let name = || node.name.clone();
    let kind = node.kind();
    let mut checks = Vec::new();

    let required = matches!(
        kind,
        StateKind::Initial
            | StateKind::Transition
            | StateKind::Wait
            | StateKind::TaskWait
            | StateKind::Nest
            | StateKind::Split
            | StateKind::Leave
    );
    let main = node.payload.main_transition();
    if required && !(kind.is_composite() && composite_unconfigured(node)) {
        checks.push(require(main.is_some(), || BuildError::MissingTransition {
            state: name(),
            kind,
        }));
    }

    if matches!(kind, StateKind::Initial | StateKind::Leave) {
        if let Some(main) = main {
            checks.push(require(chart.transitions[main.0].target.is_some(), || {
                BuildError::MissingTarget { state: name() }
            }));
        }
    }

    if let Payload::Composite(composite) = &node.payload {
        checks.push(require(composite.configured > 0, || {
            BuildError::MissingNestedRegion { state: name() }
        }));
        if composite.split && composite.configured > 0 {
            checks.push(require(composite.branches.len() >= 2, || {
                BuildError::NotEnoughRegions {
                    state: name(),
                    count: composite.branches.len(),
                }
            }));
        }
    }

    // Leave transitions land next to the enclosing composite.
    let owner = chart.regions[node.region.0].owner;
    let permitted = if kind == StateKind::Leave {
        checks.push(require(owner.is_some(), || BuildError::LeaveAtRoot {
            state: name(),
        }));
        owner.map(|owner| chart.states[owner.0].region)
    } else {
        Some(node.region)
    };

    for transition in node.payload.transitions() {
        let Some(target) = chart.transitions[transition.0].target else {
            continue;
        };
        let pointing_home = target == id || (kind == StateKind::Leave && Some(target) == owner);
        checks.push(require(!pointing_home, || BuildError::SelfTransition {
            state: name(),
        }));

        let Some(permitted) = permitted else {
            continue;
        };
        let in_region = chart
            .states
            .get(target.0)
            .map_or(false, |target| target.region == permitted);
        checks.push(require(in_region, || BuildError::TargetOutOfRegion {
            state: name(),
            target: chart
                .states
                .get(target.0)
                .map_or_else(|| target.to_string(), |target| target.name.clone()),
        }));
    }

    checks
}

fn composite_unconfigured(node: &StateNode) -> bool {
    matches!(&node.payload, Payload::Composite(composite) if composite.configured == 0)
}
