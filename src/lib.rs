//! Statechart: a hierarchical run-to-completion statechart engine
//!
//! A chart is a tree of regions. Each region holds states and is always
//! resting on exactly one of them. Nest and split states own inner regions,
//! so a chart can model sub-workflows and parallel branches that join
//! again. Events are processed to completion: a chart only returns to the
//! caller once every region is blocked on a state that waits for something.
//!
//! # Core Concepts
//!
//! - **Events**: identity-compared triggers created once and reused
//! - **States**: initial, final, simple, transition, choice, wait, task-wait,
//!   nest, split and leave
//! - **Wait activities**: application-driven completion trees that hold a
//!   wait state until every branch completes
//! - **Faults**: a panicking callback is recorded and the chart carries on
//!
//! # Example
//!
//! ```rust
//! use statechart::{Event, NestedRegion, Statechart};
//!
//! let left_done = Event::new("left_done");
//! let right_done = Event::new("right_done");
//!
//! let mut chart = Statechart::new(|region| {
//!     let initial = region.initial("Initial");
//!     let work = region.split("Work");
//!     let joined = region.final_state("Joined");
//!
//!     initial.transition().target(&work);
//!     work.split([
//!         NestedRegion::new(|branch| {
//!             let initial = branch.initial("LeftStart");
//!             let busy = branch.state("LeftBusy");
//!             let done = branch.final_state("LeftFinal");
//!             initial.transition().target(&busy);
//!             busy.event(&left_done).target(&done);
//!         }),
//!         NestedRegion::new(|branch| {
//!             let initial = branch.initial("RightStart");
//!             let busy = branch.state("RightBusy");
//!             let done = branch.final_state("RightFinal");
//!             initial.transition().target(&busy);
//!             busy.event(&right_done).target(&done);
//!         }),
//!     ])
//!     .target(&joined);
//! })
//! .unwrap();
//!
//! chart.run();
//! chart.trigger(&left_done);
//! assert_eq!(chart.current_state(), "Work");
//!
//! chart.trigger(&right_done);
//! assert_eq!(chart.current_state(), "Joined");
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod engine;
pub mod statechart;
pub mod validation;

// Re-export commonly used types
pub use builder::{
    BuildError, ChoiceState, ChoiceTransition, ConfigurationError, FinalState, InitialState,
    LeaveState, NestState, NestedRegion, Region, SimpleState, SplitState, StateRef,
    StatechartBuilder, TaskWaitState, Transition, TransitionState, WaitState,
};
pub use config::{Settings, SettingsError};
pub use core::{
    ActivityId, Event, EventId, Guard, Journal, RegionId, StateId, StateKind, TransitionRecord,
    WaitActivity,
};
pub use engine::{Fault, Phase};
pub use statechart::Statechart;
pub use validation::Hazard;
