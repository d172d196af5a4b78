//! Configuration errors for statechart builders.

use crate::core::StateKind;
use std::fmt;
use thiserror::Error;

/// A problem with the topology or wiring of a chart.
///
/// Errors are accumulated while the chart is configured and validated, and
/// returned together in a [`ConfigurationError`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("{region} has no initial state. Call .initial(name) in its setup")]
    MissingInitialState { region: String },

    #[error("{region} already has initial state '{existing}', cannot add '{duplicate}'")]
    DuplicateInitialState {
        region: String,
        existing: String,
        duplicate: String,
    },

    #[error("{region} already has final state '{existing}', cannot add '{duplicate}'")]
    DuplicateFinalState {
        region: String,
        existing: String,
        duplicate: String,
    },

    #[error("Transition of '{state}' targets its own state")]
    SelfTransition { state: String },

    #[error("Split state '{state}' has {count} regions, at least 2 are required")]
    NotEnoughRegions { state: String, count: usize },

    #[error("Nested regions of '{state}' are defined more than once")]
    NestedRegionRedefined { state: String },

    #[error("Composite state '{state}' has no nested region. Call .nest() or .split()")]
    MissingNestedRegion { state: String },

    #[error("{kind} state '{state}' has no transition defined")]
    MissingTransition { state: String, kind: StateKind },

    #[error("Transition of '{state}' has no target. Call .target(state)")]
    MissingTarget { state: String },

    #[error("Transition of '{state}' targets '{target}' outside its permitted region")]
    TargetOutOfRegion { state: String, target: String },

    #[error("Leave state '{state}' is declared in the root region")]
    LeaveAtRoot { state: String },

    #[error("Transition of '{state}' has its target set more than once")]
    TargetRedefined { state: String },

    #[error("Waiting setup of '{state}' is defined more than once")]
    SetupRedefined { state: String },

    #[error("State '{state}' registers event '{event}' more than once")]
    DuplicateEvent { state: String, event: String },
}

/// Every error found while building a chart.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub struct ConfigurationError {
    pub errors: Vec<BuildError>,
}

impl ConfigurationError {
    pub fn errors(&self) -> &[BuildError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid statechart configuration ({} errors)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}
