//! Chart settings.
//!
//! Settings control the chart's diagnostics only; they never change how
//! transitions resolve. They can be set fluently on
//! [`StatechartBuilder`](crate::StatechartBuilder) or loaded from JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bound on retained fault records.
pub const DEFAULT_FAULT_CAPACITY: usize = 64;

/// Errors that can occur while loading or saving settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Serialization to JSON failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization from JSON failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),
}

/// Diagnostic settings of a chart.
///
/// # Example
///
/// ```
/// use statechart::Settings;
///
/// let settings = Settings::from_json(r#"{ "logs_enabled": true, "journal_capacity": 16 }"#)
///     .unwrap();
///
/// assert!(settings.logs_enabled);
/// assert_eq!(settings.journal_capacity, Some(16));
/// assert_eq!(settings.fault_capacity, statechart::config::DEFAULT_FAULT_CAPACITY);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Emit trace lines for every state
    pub logs_enabled: bool,

    /// Capture creation backtraces of states and transitions
    pub capture_backtraces: bool,

    /// Number of transitions kept in the journal, `None` disables it
    pub journal_capacity: Option<usize>,

    /// Number of fault records kept, 0 keeps none
    pub fault_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logs_enabled: false,
            capture_backtraces: false,
            journal_capacity: None,
            fault_capacity: DEFAULT_FAULT_CAPACITY,
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(json).map_err(|e| SettingsError::DeserializationFailed(e.to_string()))
    }

    /// Serialize settings as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(|e| SettingsError::SerializationFailed(e.to_string()))
    }
}
