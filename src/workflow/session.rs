//! Record and Replay Sessions
//!
//! A [`RecordSession`] wires the object tracker, the classification engine and
//! the script writer together on the GUI thread. A [`ReplaySession`] owns the
//! tracker and the runner for one script.

use crate::capture::types::{InputEvent, Signal};
use crate::classify::{ClassificationEngine, ClassifierConfig, Renderer};
use crate::gui::{GuiHandle, GuiLoop};
use crate::host::Value;
use crate::runner::{RunConfig, RunHandle, RunOutcome, ScriptRunner};
use crate::script::{GenerationConfig, ScriptItem, ScriptWriter};
use crate::time::Timestamp;
use crate::tracker::ObjectTracker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// What a session does with the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Record,
    Run,
}

/// Bookkeeping for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Unique session ID
    pub id: Uuid,
    pub mode: SessionMode,
    pub script: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Raw events accepted (record) or zero (run)
    pub event_count: usize,
    /// Script items produced (record) or zero (run)
    pub item_count: usize,
}

impl SessionMetadata {
    pub fn new(mode: SessionMode, script: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            script,
            started_at: Utc::now(),
            ended_at: None,
            event_count: 0,
            item_count: 0,
        }
    }

    pub fn finalize(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Records interactions into a script.
///
/// Lives on the GUI thread. The host feeds it raw events and signals and
/// calls [`RecordSession::tick`] periodically so delayed classifications and
/// the keystroke watchdog can expire.
pub struct RecordSession {
    metadata: SessionMetadata,
    tracker: Arc<ObjectTracker>,
    engine: ClassificationEngine,
    writer: ScriptWriter,
}

impl RecordSession {
    /// Start recording with a fresh tracker
    pub fn new(
        gui: GuiHandle,
        generation: &GenerationConfig,
        classifier: ClassifierConfig,
    ) -> crate::Result<Self> {
        Self::with_tracker(ObjectTracker::new(gui), generation, classifier)
    }

    /// Start recording against an existing tracker.
    ///
    /// The script file is validated and opened before anything is classified.
    pub fn with_tracker(
        tracker: Arc<ObjectTracker>,
        generation: &GenerationConfig,
        classifier: ClassifierConfig,
    ) -> crate::Result<Self> {
        generation.validate()?;
        classifier.validate()?;
        let writer = ScriptWriter::create(generation)?;
        let render = Renderer::new(
            generation.text_index_behavior,
            generation.duplicate_mouse_event,
        );
        let engine = ClassificationEngine::new(tracker.clone(), classifier, render);
        let metadata = SessionMetadata::new(SessionMode::Record, generation.script_path.clone());
        info!(session = %metadata.id, script = %generation.script_path.display(), "Recording started");
        Ok(Self {
            metadata,
            tracker,
            engine,
            writer,
        })
    }

    pub fn tracker(&self) -> &Arc<ObjectTracker> {
        &self.tracker
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn engine(&self) -> &ClassificationEngine {
        &self.engine
    }

    /// Classify one raw input event
    pub fn handle_event(&mut self, event: &InputEvent) -> crate::Result<()> {
        self.tracker.flush();
        if !self.tracker.is_known(event.target) {
            trace!(object = %event.target, kind = ?event.kind, "Event for unknown object ignored");
            return Ok(());
        }
        self.metadata.event_count += 1;
        let items = self.engine.handle_event(event);
        self.write(items)
    }

    /// Feed a confirmation signal
    pub fn handle_signal(&mut self, signal: &Signal) -> crate::Result<()> {
        let items = self.engine.handle_signal(signal);
        self.write(items)
    }

    /// Expire deadlines that passed by `now`
    pub fn tick(&mut self, now: Timestamp) -> crate::Result<()> {
        let items = self.engine.tick(now);
        self.write(items)
    }

    /// Insert a note into the script
    pub fn add_comment(&mut self, text: impl Into<String>) -> crate::Result<()> {
        let pending = self.engine.flush();
        self.write(pending)?;
        self.write(vec![ScriptItem::comment(text)])
    }

    /// Insert property checks on the object at `path`
    pub fn add_verification(
        &mut self,
        path: impl Into<String>,
        checks: Vec<(String, Value)>,
    ) -> crate::Result<()> {
        let pending = self.engine.flush();
        self.write(pending)?;
        self.write(vec![ScriptItem::Verification {
            path: path.into(),
            checks,
        }])
    }

    fn write(&mut self, items: Vec<ScriptItem>) -> crate::Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        debug!(count = items.len(), "Writing classified items");
        self.metadata.item_count += items.len();
        self.writer.extend(items)
    }

    /// Flush pending classifications and commit the script
    pub fn stop(mut self) -> crate::Result<SessionMetadata> {
        let items = self.engine.flush();
        self.write(items)?;
        let path = self.writer.finish()?;
        self.metadata.script = path;
        self.metadata.finalize();
        info!(
            session = %self.metadata.id,
            events = self.metadata.event_count,
            items = self.metadata.item_count,
            "Recording stopped"
        );
        Ok(self.metadata)
    }

    /// Abandon the recording; the script file is left untouched
    pub fn cancel(self) {
        info!(session = %self.metadata.id, "Recording cancelled");
        self.writer.cancel();
    }
}

/// Replays one script against the live application
pub struct ReplaySession {
    metadata: SessionMetadata,
    tracker: Arc<ObjectTracker>,
    runner: ScriptRunner,
}

impl ReplaySession {
    /// Replay with a fresh tracker
    pub fn new(gui: GuiHandle, config: RunConfig) -> crate::Result<Self> {
        let tracker = ObjectTracker::new(gui.clone());
        Self::with_tracker(gui, tracker, config)
    }

    pub fn with_tracker(
        gui: GuiHandle,
        tracker: Arc<ObjectTracker>,
        config: RunConfig,
    ) -> crate::Result<Self> {
        let metadata = SessionMetadata::new(SessionMode::Run, config.script_path.clone());
        let runner = ScriptRunner::new(gui, tracker.clone(), config)?;
        Ok(Self {
            metadata,
            tracker,
            runner,
        })
    }

    pub fn tracker(&self) -> &Arc<ObjectTracker> {
        &self.tracker
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Start the script on the runner thread
    pub fn start(&self) -> crate::Result<RunHandle> {
        info!(session = %self.metadata.id, script = %self.metadata.script.display(), "Replay started");
        self.runner.start(&self.metadata.script)
    }

    /// Run the script to completion while pumping `gui`
    pub fn run(&mut self, gui: &GuiLoop, timeout: Duration) -> crate::Result<RunOutcome> {
        let outcome = self.start()?.wait(gui, timeout)?;
        self.metadata.finalize();
        info!(
            session = %self.metadata.id,
            exit_code = outcome.exit_code,
            "Replay finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::{EventKind, MouseButton};
    use crate::host::{LiveObject, MemoryHost, MemoryObject, Point, WidgetClass};
    use tempfile::TempDir;

    fn press_release(session: &mut RecordSession, target: &Arc<MemoryObject>, t: u64) {
        let pos = target.size().center();
        for (kind, at) in [(EventKind::MousePress, t), (EventKind::MouseRelease, t + 40)] {
            let event = InputEvent::mouse(kind, target.id(), MouseButton::Left, pos, Timestamp::from_millis(at));
            session.handle_event(&event).unwrap();
        }
    }

    #[test]
    fn test_record_writes_script() {
        let dir = TempDir::new().unwrap();
        let gui = GuiLoop::new();
        let host = MemoryHost::new();
        let generation = GenerationConfig {
            script_path: dir.path().join("rec.lua"),
            ..Default::default()
        };
        let mut session =
            RecordSession::new(gui.handle(), &generation, ClassifierConfig::default()).unwrap();
        host.attach(session.tracker().clone());
        let window = host.create_root("MainWindow", "main", Some(WidgetClass::Window));
        let agree = host.create(&window, "CheckBox", "agree", Some(WidgetClass::CheckBox));

        press_release(&mut session, &agree, 1000);
        session.tick(Timestamp::from_millis(2000)).unwrap();
        session
            .add_verification("n=main_0/n=agree_0", vec![("checked".to_string(), Value::Bool(true))])
            .unwrap();
        let metadata = session.stop().unwrap();

        assert_eq!(metadata.event_count, 2);
        assert_eq!(metadata.item_count, 2);
        let script = std::fs::read_to_string(dir.path().join("rec.lua")).unwrap();
        assert_eq!(
            script,
            "function test()\n    checkButton('n=main_0/n=agree_0', true);\n    verify('n=main_0/n=agree_0', 'checked', 'true');\nend\n\ntest()\n"
        );
    }

    #[test]
    fn test_unknown_targets_are_ignored() {
        let dir = TempDir::new().unwrap();
        let gui = GuiLoop::new();
        let generation = GenerationConfig {
            script_path: dir.path().join("rec.lua"),
            ..Default::default()
        };
        let mut session =
            RecordSession::new(gui.handle(), &generation, ClassifierConfig::default()).unwrap();
        let event = InputEvent::mouse(
            EventKind::MousePress,
            crate::host::ObjectId(4242),
            MouseButton::Left,
            Point::new(1, 1),
            Timestamp::from_millis(10),
        );
        session.handle_event(&event).unwrap();
        assert_eq!(session.metadata().event_count, 0);
        session.cancel();
        assert!(!dir.path().join("rec.lua").exists());
    }

    #[test]
    fn test_invalid_script_path_fails_before_recording() {
        let gui = GuiLoop::new();
        let generation = GenerationConfig {
            script_path: PathBuf::from("/nonexistent-dir/rec.lua"),
            ..Default::default()
        };
        assert!(RecordSession::new(gui.handle(), &generation, ClassifierConfig::default()).is_err());
    }

    #[test]
    fn test_replay_runs_script() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("rec.lua");
        std::fs::write(
            &script,
            "function test()\n    buttonClick('n=main_0/n=ok_0');\nend\n\ntest()\n",
        )
        .unwrap();

        let gui = GuiLoop::new();
        let config = RunConfig {
            script_path: script,
            ..Default::default()
        };
        let mut session = ReplaySession::new(gui.handle(), config).unwrap();
        let host = MemoryHost::new();
        host.attach(session.tracker().clone());
        let window = host.create_root("MainWindow", "main", Some(WidgetClass::Window));
        let ok = host.create(&window, "PushButton", "ok", Some(WidgetClass::Button));

        let outcome = session.run(&gui, Duration::from_secs(10)).unwrap();
        assert!(outcome.succeeded(), "{:?}", outcome.failure);
        assert_eq!(ok.performed().len(), 1);
        assert!(session.metadata().ended_at.is_some());
    }

    #[test]
    fn test_replay_missing_script_is_io_error() {
        let gui = GuiLoop::new();
        let config = RunConfig {
            script_path: PathBuf::from("/nonexistent-dir/missing.lua"),
            ..Default::default()
        };
        let session = ReplaySession::new(gui.handle(), config).unwrap();
        assert!(matches!(session.start(), Err(crate::Error::Io(_))));
    }
}
