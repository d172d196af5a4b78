//! Validation of configured charts.
//!
//! Validation runs once, when a chart is built. It uses Stillwater's
//! `Validation` type to accumulate every problem instead of stopping at the
//! first one, so a broken configuration is reported in a single pass.
//!
//! Problems come in two severities:
//! - [`BuildError`](crate::BuildError): the chart cannot run and is not built
//! - [`Hazard`]: the chart is built, but some state can stall; hazards are
//!   logged with `tracing::warn!` and kept on the chart

mod hazards;
mod rules;

pub use hazards::Hazard;

pub(crate) use hazards::find_hazards;
pub(crate) use rules::validate;
