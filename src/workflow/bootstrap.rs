//! Session Bootstrap
//!
//! The launcher hands the injected engine a JSON settings blob, either
//! directly or through the `WIDGET_REPLAY_LAUNCH` environment variable.
//! [`Bootstrap`] parses it and starts the matching session.

use super::session::{RecordSession, ReplaySession, SessionMode};
use crate::classify::ClassifierConfig;
use crate::gui::GuiHandle;
use crate::runner::RunConfig;
use crate::script::GenerationConfig;
use crate::tracker::ObjectTracker;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Environment variable carrying the launch blob
pub const LAUNCH_ENV: &str = "WIDGET_REPLAY_LAUNCH";

/// Settings passed across the process boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSettings {
    pub mode: SessionMode,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl LaunchSettings {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            generation: GenerationConfig::default(),
            run: RunConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }

    /// Check the sections the selected mode uses
    pub fn validate(&self) -> crate::Result<()> {
        match self.mode {
            SessionMode::Record => {
                self.generation.validate()?;
                self.classifier.validate()
            }
            SessionMode::Run => self.run.validate(),
        }
    }

    pub fn to_blob(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A started session of either kind
pub enum Session {
    Record(RecordSession),
    Replay(ReplaySession),
}

impl Session {
    pub fn tracker(&self) -> &Arc<ObjectTracker> {
        match self {
            Session::Record(session) => session.tracker(),
            Session::Replay(session) => session.tracker(),
        }
    }

    pub fn mode(&self) -> SessionMode {
        match self {
            Session::Record(_) => SessionMode::Record,
            Session::Replay(_) => SessionMode::Run,
        }
    }
}

/// Validated launch settings, ready to start a session
#[derive(Debug, Clone)]
pub struct Bootstrap {
    settings: LaunchSettings,
}

impl Bootstrap {
    pub fn new(settings: LaunchSettings) -> crate::Result<Self> {
        settings
            .validate()
            .map_err(|e| crate::Error::Bootstrap(format!("invalid launch settings: {}", e)))?;
        Ok(Self { settings })
    }

    pub fn from_blob(blob: &str) -> crate::Result<Self> {
        let settings: LaunchSettings = serde_json::from_str(blob)
            .map_err(|e| crate::Error::Bootstrap(format!("malformed launch blob: {}", e)))?;
        Self::new(settings)
    }

    pub fn from_env() -> crate::Result<Self> {
        let blob = std::env::var(LAUNCH_ENV)
            .map_err(|_| crate::Error::Bootstrap(format!("{} is not set", LAUNCH_ENV)))?;
        Self::from_blob(&blob)
    }

    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Start the session with a fresh tracker on `gui`'s thread
    pub fn start(&self, gui: GuiHandle) -> crate::Result<Session> {
        let tracker = ObjectTracker::new(gui.clone());
        self.start_with(gui, tracker)
    }

    /// Start the session on an existing tracker
    pub fn start_with(&self, gui: GuiHandle, tracker: Arc<ObjectTracker>) -> crate::Result<Session> {
        info!(mode = ?self.settings.mode, "Starting session from launch settings");
        match self.settings.mode {
            SessionMode::Record => RecordSession::with_tracker(
                tracker,
                &self.settings.generation,
                self.settings.classifier.clone(),
            )
            .map(Session::Record),
            SessionMode::Run => {
                ReplaySession::with_tracker(gui, tracker, self.settings.run.clone()).map(Session::Replay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gui::GuiLoop;
    use tempfile::TempDir;

    #[test]
    fn test_blob_round_trip_starts_record_session() {
        let dir = TempDir::new().unwrap();
        let mut settings = LaunchSettings::new(SessionMode::Record);
        settings.generation.script_path = dir.path().join("rec.lua");
        let blob = settings.to_blob().unwrap();

        let bootstrap = Bootstrap::from_blob(&blob).unwrap();
        assert_eq!(bootstrap.settings(), &settings);

        let gui = GuiLoop::new();
        let session = bootstrap.start(gui.handle()).unwrap();
        assert_eq!(session.mode(), SessionMode::Record);
        match session {
            Session::Record(record) => record.cancel(),
            Session::Replay(_) => panic!("expected a record session"),
        }
    }

    #[test]
    fn test_minimal_blob_uses_defaults() {
        let bootstrap = Bootstrap::from_blob(r#"{"mode": "run"}"#).unwrap();
        assert_eq!(bootstrap.settings().run, RunConfig::default());
    }

    #[test]
    fn test_rejects_bad_blobs() {
        assert!(matches!(
            Bootstrap::from_blob("not json"),
            Err(crate::Error::Bootstrap(_))
        ));
        assert!(matches!(
            Bootstrap::from_blob(r#"{"mode": "run", "run": {"retrieval_attempts": 0}}"#),
            Err(crate::Error::Bootstrap(_))
        ));
    }
}
