//! Runtime settings.
//!
//! Defaults suit an interactive dialogue. Any value can be overridden from
//! the environment or from a JSON document.

use crate::runtime::InterpreterOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const NO_INPUT_TIMEOUT_VAR: &str = "PARLEY_NO_INPUT_TIMEOUT_SECS";
pub const EVENT_BUFFER_VAR: &str = "PARLEY_EVENT_BUFFER";
pub const MAX_MICROSTEPS_VAR: &str = "PARLEY_MAX_MICROSTEPS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Invalid settings document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds the recogniser waits for speech before giving up.
    pub no_input_timeout_secs: u64,
    /// Capacity of the external event channel of a session.
    pub event_buffer: usize,
    pub max_microsteps: usize,
    pub history_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let options = InterpreterOptions::default();
        Self {
            no_input_timeout_secs: 10,
            event_buffer: 32,
            max_microsteps: options.max_microsteps,
            history_capacity: options.history_capacity,
        }
    }
}

impl Settings {
    /// Defaults overridden by the `PARLEY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(secs) = parse_var(&lookup, NO_INPUT_TIMEOUT_VAR)? {
            settings.no_input_timeout_secs = secs;
        }
        if let Some(buffer) = parse_var(&lookup, EVENT_BUFFER_VAR)? {
            settings.event_buffer = buffer as usize;
        }
        if let Some(limit) = parse_var(&lookup, MAX_MICROSTEPS_VAR)? {
            settings.max_microsteps = limit as usize;
        }
        Ok(settings)
    }

    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn no_input_timeout(&self) -> Duration {
        Duration::from_secs(self.no_input_timeout_secs)
    }

    pub fn interpreter_options(&self) -> InterpreterOptions {
        InterpreterOptions {
            max_microsteps: self.max_microsteps,
            history_capacity: self.history_capacity,
        }
    }
}

fn parse_var<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ConfigError::InvalidNumber { var, value: raw }),
    }
}
