//! Event Classification
//!
//! Turns raw input events and confirmation signals into script items.
//!
//! - [`commands`]: rendering of action lines
//! - [`filters`]: ordinary filter chain, tried on release
//! - [`delayed`]: classes whose effect is confirmed later
//! - [`text_input`]: keystroke accumulation
//! - [`engine`]: the state machine tying them together

pub mod commands;
pub mod delayed;
pub mod engine;
pub mod filters;
pub mod text_input;

pub use commands::Renderer;
pub use delayed::{DelayPhase, DelayState, DelayedContext, Resolution};
pub use engine::ClassificationEngine;
pub use filters::Outcome;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classifier timing and search configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Wait for a confirmation signal after release (ms)
    pub delayed_timeout_ms: u64,
    /// Second press within this interval makes a double click (ms)
    pub double_click_ms: u64,
    /// Presses held longer than this are drags or holds (ms)
    pub tap_threshold_ms: u64,
    /// Pending text is flushed after this much keyboard silence (ms)
    pub key_idle_ms: u64,
    /// Propagated copies of an event within this window are dropped (ms)
    pub duplicate_window_ms: u64,
    /// Ancestor levels searched for a widget class
    pub ancestor_depth: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            delayed_timeout_ms: 500,
            double_click_ms: 400,
            tap_threshold_ms: 100,
            key_idle_ms: 5000,
            duplicate_window_ms: 100,
            ancestor_depth: 4,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.delayed_timeout_ms == 0 {
            return Err(crate::Error::Config(
                "delayed_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.double_click_ms == 0 {
            return Err(crate::Error::Config("double_click_ms must be > 0".to_string()));
        }
        if self.key_idle_ms == 0 {
            return Err(crate::Error::Config("key_idle_ms must be > 0".to_string()));
        }
        if self.ancestor_depth == 0 {
            return Err(crate::Error::Config("ancestor_depth must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn delayed_timeout(&self) -> Duration {
        Duration::from_millis(self.delayed_timeout_ms)
    }

    pub fn double_click_interval(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }

    pub fn tap_threshold(&self) -> Duration {
        Duration::from_millis(self.tap_threshold_ms)
    }

    pub fn key_idle(&self) -> Duration {
        Duration::from_millis(self.key_idle_ms)
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_millis(self.duplicate_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = ClassifierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delayed_timeout(), Duration::from_millis(500));
        assert_eq!(config.double_click_interval(), Duration::from_millis(400));
        assert_eq!(config.ancestor_depth, 4);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = ClassifierConfig {
            ancestor_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
