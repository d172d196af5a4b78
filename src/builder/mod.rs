//! Builder API for configuring statecharts.
//!
//! A chart is configured by a setup closure that receives the root
//! [`Region`]. States are added to regions and returned as typed handles;
//! transitions are configured fluently from those handles. Nest and split
//! states receive their inner regions through further setup closures.
//!
//! Configuration problems do not stop the setup closure. They are
//! accumulated and returned together from [`StatechartBuilder::build`].

#[macro_use]
mod macros;

pub mod error;
pub mod machine;
pub mod region;
pub mod states;
pub mod transition;

pub use error::{BuildError, ConfigurationError};
pub use machine::StatechartBuilder;
pub use region::{NestedRegion, Region};
pub use states::{
    ChoiceState, FinalState, InitialState, LeaveState, NestState, SimpleState, SplitState,
    StateRef, TaskWaitState, TransitionState, WaitState,
};
pub use transition::{ChoiceTransition, Transition};
