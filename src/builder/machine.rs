//! Builder for constructing statecharts.

use crate::builder::error::ConfigurationError;
use crate::builder::region::{Blueprint, Region};
use crate::config::Settings;
use crate::core::Journal;
use crate::engine::faults::Diagnostics;
use crate::engine::Chart;
use crate::statechart::Statechart;
use crate::validation::{find_hazards, validate};
use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;
use stillwater::validation::Validation;
use uuid::Uuid;

/// Builder for constructing statecharts with a fluent API.
///
/// # Example
///
/// ```
/// use statechart::{Event, StatechartBuilder};
///
/// let go = Event::new("go");
/// let mut chart = StatechartBuilder::new()
///     .logs_enabled(true)
///     .journal(32)
///     .build(|region| {
///         let initial = region.initial("Start");
///         let idle = region.state("Idle");
///         let done = region.final_state("Done");
///         initial.transition().target(&idle);
///         idle.event(&go).target(&done);
///     })
///     .unwrap();
///
/// chart.run();
/// chart.trigger(&go);
/// assert_eq!(chart.current_state(), "Done");
/// ```
#[derive(Clone, Debug, Default)]
pub struct StatechartBuilder {
    settings: Settings,
}

impl StatechartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every setting at once, e.g. with settings loaded from JSON.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Emit trace lines for every state.
    pub fn logs_enabled(mut self, enabled: bool) -> Self {
        self.settings.logs_enabled = enabled;
        self
    }

    /// Capture a backtrace where each state and transition is created and
    /// attach it to fault reports.
    pub fn capture_backtraces(mut self, enabled: bool) -> Self {
        self.settings.capture_backtraces = enabled;
        self
    }

    /// Keep the last `capacity` committed transitions.
    pub fn journal(mut self, capacity: usize) -> Self {
        self.settings.journal_capacity = Some(capacity);
        self
    }

    /// Keep at most `capacity` fault records.
    pub fn fault_capacity(mut self, capacity: usize) -> Self {
        self.settings.fault_capacity = capacity;
        self
    }

    /// Configure the root region with `setup`, validate the result and
    /// return a chart ready to [`run`](Statechart::run).
    ///
    /// All configuration and validation errors are collected and returned
    /// together.
    pub fn build(self, setup: impl FnOnce(&Region)) -> Result<Statechart, ConfigurationError> {
        let diagnostics = Diagnostics {
            instance_id: Uuid::new_v4(),
            logs_enabled: self.settings.logs_enabled,
            capture_backtraces: self.settings.capture_backtraces,
            fault_capacity: self.settings.fault_capacity,
            faults: VecDeque::new(),
            journal: self.settings.journal_capacity.map(Journal::with_capacity),
        };
        let blueprint = Blueprint::shared(Chart::new(diagnostics));
        let root = blueprint.borrow_mut().add_region(0, None);

        setup(&Region {
            blueprint: Rc::clone(&blueprint),
            id: root,
            layer: 0,
        });

        let (chart, errors) = {
            let mut finished = blueprint.borrow_mut();
            finished.sealed = true;
            let placeholder = Chart::new(finished.chart.diagnostics.detached());
            (
                mem::replace(&mut finished.chart, placeholder),
                mem::take(&mut finished.errors),
            )
        };

        if let Validation::Failure(errors) = validate(&chart, errors) {
            return Err(ConfigurationError {
                errors: errors.iter().cloned().collect(),
            });
        }

        let hazards = find_hazards(&chart);
        for hazard in &hazards {
            tracing::warn!(chart = %chart.diagnostics.instance_id, "statechart hazard: {}", hazard);
        }

        Ok(Statechart::new_validated(chart, root, hazards, self.settings))
    }
}
