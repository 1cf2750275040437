//! Script Runner
//!
//! Replays a recorded Lua script against the live object graph.
//!
//! - [`registry`]: path to object maps kept current by the tracker
//! - [`api`]: the action functions scripts call, with bounded retries
//! - [`interpreter`]: the sandboxed Lua state on its own thread
//! - [`report`]: what happened during a run

pub mod api;
pub mod interpreter;
pub mod registry;
pub mod report;

pub use api::{ActionApi, ItemTarget, ScriptError};
pub use registry::ObjectRegistry;
pub use report::{LogCategory, LogEntry, RunReport, VerificationRecord};
pub use interpreter::{
    check_script, check_source, RunHandle, RunOutcome, ScriptCheck, ScriptFailure, ScriptRunner,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Fewest lookup attempts allowed
pub const MIN_ATTEMPTS: u32 = 1;

/// Shortest interval between attempts
pub const MIN_INTERVAL_MS: u64 = 10;

/// Exit code of a successful run
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code of a failed run
pub const EXIT_FAILURE: i32 = 1;

/// Replay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Script to replay
    pub script_path: PathBuf,
    /// Attempts to find an object by path
    pub retrieval_attempts: u32,
    /// Milliseconds between lookup attempts
    pub retrieval_interval_ms: u64,
    /// Attempts for `verify`
    pub verify_attempts: u32,
    /// Milliseconds between verify attempts
    pub verify_interval_ms: u64,
    /// Default `waitFor` timeout in seconds
    pub wait_for_timeout_secs: f64,
    /// Longest wait for the GUI thread to answer one call
    pub invoke_timeout_ms: u64,
    /// Require objects to be visible and enabled before acting
    pub check_availability: bool,
    /// Log how long each action took
    pub report_elapsed: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from("recorded.lua"),
            retrieval_attempts: 10,
            retrieval_interval_ms: 300,
            verify_attempts: 5,
            verify_interval_ms: 500,
            wait_for_timeout_secs: 10.0,
            invoke_timeout_ms: 10_000,
            check_availability: true,
            report_elapsed: false,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.retrieval_attempts < MIN_ATTEMPTS || self.verify_attempts < MIN_ATTEMPTS {
            return Err(crate::Error::Config(format!(
                "attempt counts must be >= {}",
                MIN_ATTEMPTS
            )));
        }
        if self.retrieval_interval_ms < MIN_INTERVAL_MS || self.verify_interval_ms < MIN_INTERVAL_MS {
            return Err(crate::Error::Config(format!(
                "retry intervals must be >= {} ms",
                MIN_INTERVAL_MS
            )));
        }
        if !self.wait_for_timeout_secs.is_finite() || self.wait_for_timeout_secs < 0.0 {
            return Err(crate::Error::Config(
                "wait_for_timeout_secs must be a non-negative number".to_string(),
            ));
        }
        if self.invoke_timeout_ms == 0 {
            return Err(crate::Error::Config("invoke_timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Copy with attempt counts and intervals raised to their minimums
    pub fn clamped(&self) -> Self {
        Self {
            retrieval_attempts: self.retrieval_attempts.max(MIN_ATTEMPTS),
            retrieval_interval_ms: self.retrieval_interval_ms.max(MIN_INTERVAL_MS),
            verify_attempts: self.verify_attempts.max(MIN_ATTEMPTS),
            verify_interval_ms: self.verify_interval_ms.max(MIN_INTERVAL_MS),
            ..self.clone()
        }
    }

    pub fn retrieval_interval(&self) -> Duration {
        Duration::from_millis(self.retrieval_interval_ms)
    }

    pub fn verify_interval(&self) -> Duration {
        Duration::from_millis(self.verify_interval_ms)
    }

    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }

    pub fn wait_for_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.wait_for_timeout_secs.max(0.0))
    }
}
