//! Action API
//!
//! The operations a replayed script performs. Every call runs on the runner
//! thread; reads and writes of live objects are marshaled onto the GUI
//! thread with a blocking [`GuiHandle::call`].

use super::registry::ObjectRegistry;
use super::report::{LogCategory, RunReport, VerificationRecord};
use super::RunConfig;
use crate::capture::types::MouseButton;
use crate::gui::GuiHandle;
use crate::host::{
    HostError, ItemSelector, LiveObject, ObjectAction, ObjectId, Point, SelectionCell, Value,
};
use crate::tracker::{ObjectTracker, Scene};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Granularity of cancellable sleeps
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Failures of a single script action
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("Failed to find the object at path '{path}' after {attempts} attempts with an interval of {interval_ms} ms")]
    NotFound {
        path: String,
        attempts: u32,
        interval_ms: u64,
    },

    #[error("Object at path '{path}' is not available for interaction ({reason}) after {attempts} attempts with an interval of {interval_ms} ms")]
    NotAvailable {
        path: String,
        reason: String,
        attempts: u32,
        interval_ms: u64,
    },

    #[error("Verification failed for '{path}': property '{property}' expected '{expected}', actual '{actual}' after {attempts} attempts with an interval of {interval_ms} ms")]
    VerifyFailed {
        path: String,
        property: String,
        expected: String,
        actual: String,
        attempts: u32,
        interval_ms: u64,
    },

    #[error("Object at path '{path}' has no property '{property}'")]
    UnknownProperty { path: String, property: String },

    #[error("Action '{action}' failed on '{path}': {source}")]
    Host {
        path: String,
        action: String,
        #[source]
        source: HostError,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Script cancelled")]
    Cancelled,

    #[error("GUI thread error: {0}")]
    Gui(String),
}

pub type ApiResult<T> = std::result::Result<T, ScriptError>;

/// Raise a [`ScriptError`] inside the interpreter
pub fn lua_error(error: ScriptError) -> mlua::Error {
    mlua::Error::external(error)
}

/// Row/column or text reference to an item inside a view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemTarget {
    /// Row path for trees, `{row, column}` for flat views
    Index(Vec<i32>),
    /// Display text, resolved on the live view
    Text(String),
}

/// Script actions bound to one live application
pub struct ActionApi {
    gui: GuiHandle,
    tracker: Arc<ObjectTracker>,
    registry: Arc<ObjectRegistry>,
    config: RunConfig,
    cancel: Arc<AtomicBool>,
    report: Arc<Mutex<RunReport>>,
}

impl ActionApi {
    pub fn new(
        gui: GuiHandle,
        tracker: Arc<ObjectTracker>,
        registry: Arc<ObjectRegistry>,
        config: RunConfig,
        cancel: Arc<AtomicBool>,
        report: Arc<Mutex<RunReport>>,
    ) -> Self {
        Self {
            gui,
            tracker,
            registry,
            config: config.clamped(),
            cancel,
            report,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn report(&self) -> &Arc<Mutex<RunReport>> {
        &self.report
    }

    pub fn check_cancelled(&self) -> ApiResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(ScriptError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn log(&self, category: LogCategory, message: impl Into<String>) {
        self.report.lock().log(category, message);
    }

    /// Sleep in slices, returning early with `Cancelled`
    pub fn sleep(&self, duration: Duration) -> ApiResult<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check_cancelled()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Resolve a path with the bounded retrieval policy
    pub fn find(&self, path: &str) -> ApiResult<ObjectId> {
        let attempts = self.config.retrieval_attempts;
        for attempt in 1..=attempts {
            self.check_cancelled()?;
            if let Some(id) = self.registry.resolve(&self.tracker, path) {
                trace!(path, attempt, "Resolved object");
                return Ok(id);
            }
            if attempt < attempts {
                self.sleep(self.config.retrieval_interval())?;
            }
        }
        Err(ScriptError::NotFound {
            path: path.to_string(),
            attempts,
            interval_ms: self.config.retrieval_interval_ms,
        })
    }

    /// `waitFor`: poll for the path until `timeout`
    pub fn wait_for(&self, path: &str, timeout: Option<Duration>) -> ApiResult<()> {
        let timeout = timeout.unwrap_or_else(|| self.config.wait_for_timeout());
        let deadline = Instant::now() + timeout;
        let mut attempts = 0;
        loop {
            self.check_cancelled()?;
            attempts += 1;
            if self.registry.resolve(&self.tracker, path).is_some() {
                self.report.lock().record_path(path);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScriptError::NotFound {
                    path: path.to_string(),
                    attempts,
                    interval_ms: self.config.retrieval_interval_ms,
                });
            }
            self.sleep(self.config.retrieval_interval().min(timeout))?;
        }
    }

    fn handle(&self, path: &str, id: ObjectId) -> ApiResult<Arc<dyn LiveObject>> {
        self.tracker.object(id).ok_or_else(|| ScriptError::NotFound {
            path: path.to_string(),
            attempts: 1,
            interval_ms: self.config.retrieval_interval_ms,
        })
    }

    fn on_gui<R: Send + 'static>(&self, f: impl FnOnce() -> R + Send + 'static) -> ApiResult<R> {
        self.gui
            .call(self.config.invoke_timeout(), f)
            .map_err(|e| ScriptError::Gui(e.to_string()))
    }

    /// Resolve `path` to an object ready for interaction
    pub fn available(&self, path: &str) -> ApiResult<Arc<dyn LiveObject>> {
        let attempts = self.config.retrieval_attempts;
        let mut reason = String::new();
        for attempt in 1..=attempts {
            let id = self.find(path)?;
            let object = self.handle(path, id)?;
            if !self.config.check_availability {
                return Ok(object);
            }
            let probe = object.clone();
            let state = self.on_gui(move || (probe.is_visible(), probe.is_enabled()))?;
            match state {
                (true, true) => return Ok(object),
                (false, _) => reason = "not visible".to_string(),
                (true, false) => reason = "not enabled".to_string(),
            }
            if attempt < attempts {
                self.sleep(self.config.retrieval_interval())?;
            }
        }
        Err(ScriptError::NotAvailable {
            path: path.to_string(),
            reason,
            attempts,
            interval_ms: self.config.retrieval_interval_ms,
        })
    }

    /// Perform `action` on the object at `path`
    pub fn perform(&self, path: &str, action: ObjectAction) -> ApiResult<()> {
        self.check_cancelled()?;
        let started = Instant::now();
        let object = self.available(path)?;
        self.report.lock().record_path(path);

        let name = action.name();
        debug!(path, action = name, "Performing action");
        let result = self.on_gui(move || object.perform(&action))?;
        result.map_err(|source| ScriptError::Host {
            path: path.to_string(),
            action: name.to_string(),
            source,
        })?;
        self.report_elapsed(name, path, started);
        Ok(())
    }

    /// Write a property of the object at `path`
    pub fn set_property(&self, path: &str, property: &str, value: Value) -> ApiResult<()> {
        self.check_cancelled()?;
        let started = Instant::now();
        let object = self.available(path)?;
        self.report.lock().record_path(path);

        let key = property.to_string();
        let result = self.on_gui(move || object.set(&key, value))?;
        result.map_err(|source| ScriptError::Host {
            path: path.to_string(),
            action: format!("set {}", property),
            source,
        })?;
        self.report_elapsed(property, path, started);
        Ok(())
    }

    /// Read a property of the object at `path`
    pub fn property(&self, path: &str, property: &str) -> ApiResult<Option<Value>> {
        let id = self.find(path)?;
        let object = self.handle(path, id)?;
        let key = property.to_string();
        self.on_gui(move || object.get(&key))
    }

    fn report_elapsed(&self, action: &str, path: &str, started: Instant) {
        if self.config.report_elapsed {
            self.log(
                LogCategory::Info,
                format!(
                    "{} on '{}' took {} ms",
                    action,
                    path,
                    started.elapsed().as_millis()
                ),
            );
        }
    }

    pub fn mouse_click(&self, path: &str, button: MouseButton, pos: Point, double: bool) -> ApiResult<()> {
        self.perform(path, ObjectAction::MouseClick { button, pos, double })
    }

    pub fn button_click(&self, path: &str, double: bool) -> ApiResult<()> {
        self.perform(path, ObjectAction::Click { double })
    }

    pub fn button_press(&self, path: &str) -> ApiResult<()> {
        self.perform(path, ObjectAction::Press)
    }

    /// Click the button only if its checked state differs from `checked`
    pub fn check_button(&self, path: &str, checked: bool) -> ApiResult<()> {
        let current = self
            .property(path, "checked")?
            .and_then(|v| v.as_bool())
            .ok_or_else(|| {
                ScriptError::InvalidArgument(format!("object at '{}' is not checkable", path))
            })?;
        if current == checked {
            self.report.lock().record_path(path);
            return Ok(());
        }
        self.perform(path, ObjectAction::Click { double: false })
    }

    pub fn select_item(&self, path: &str, selector: ItemSelector) -> ApiResult<()> {
        self.perform(path, ObjectAction::SelectItem(selector))
    }

    /// `setValue`, with an optional second value for range objects
    pub fn set_value(&self, path: &str, value: Value, second: Option<Value>) -> ApiResult<()> {
        let value = match second {
            Some(second) => Value::List(vec![value, second]),
            None => value,
        };
        self.set_property(path, "value", value)
    }

    pub fn change_value(&self, path: &str, direction: &str) -> ApiResult<()> {
        let step = match direction {
            "Up" => 1,
            "Down" => -1,
            other => {
                return Err(ScriptError::InvalidArgument(format!(
                    "changeValue direction must be 'Up' or 'Down', got '{}'",
                    other
                )))
            }
        };
        self.perform(path, ObjectAction::Step(step))
    }

    pub fn set_text(&self, path: &str, text: &str) -> ApiResult<()> {
        self.set_property(path, "text", Value::Text(text.to_string()))
    }

    pub fn set_item_text(&self, path: &str, rows: Vec<i32>, text: &str) -> ApiResult<()> {
        self.perform(
            path,
            ObjectAction::SetItemText {
                index: rows,
                text: text.to_string(),
            },
        )
    }

    pub fn delegate_click(&self, path: &str, target: ItemTarget, double: bool) -> ApiResult<()> {
        let index = match target {
            ItemTarget::Index(index) => index,
            ItemTarget::Text(text) => self.item_by_text(path, &text)?,
        };
        self.perform(path, ObjectAction::ClickItem { index, double })
    }

    /// Row path of the item displaying `text`
    fn item_by_text(&self, path: &str, text: &str) -> ApiResult<Vec<i32>> {
        let id = self.find(path)?;
        let object = self.handle(path, id)?;
        let key = text.to_string();
        let found = self.on_gui(move || object.find_item(&key))?;
        match found {
            Some(item) => Ok(item.rows),
            None => match split_text_index(text) {
                Some((_, index)) => Ok(vec![index]),
                None => Err(ScriptError::InvalidArgument(format!(
                    "no item with text '{}' in '{}'",
                    text, path
                ))),
            },
        }
    }

    /// Selector for an item of the object at `path`, resolving the
    /// `'text_index'` form when no item has the literal text
    pub fn item_selector(&self, path: &str, text: &str) -> ApiResult<ItemSelector> {
        let id = self.find(path)?;
        let object = self.handle(path, id)?;
        let key = text.to_string();
        let exists = self.on_gui(move || object.find_item(&key).is_some())?;
        Ok(text_selector(text, |_| exists))
    }

    pub fn trigger_action(&self, path: &str, checked: Option<bool>) -> ApiResult<()> {
        self.perform(path, ObjectAction::Trigger { checked })
    }

    pub fn expand_delegate(&self, path: &str, rows: Vec<i32>, expand: bool) -> ApiResult<()> {
        let action = if expand {
            ObjectAction::Expand(rows)
        } else {
            ObjectAction::Collapse(rows)
        };
        self.perform(path, action)
    }

    pub fn set_selection(&self, path: &str, cells: Vec<SelectionCell>) -> ApiResult<()> {
        self.perform(path, ObjectAction::SetSelection(cells))
    }

    pub fn clear_selection(&self, path: &str) -> ApiResult<()> {
        self.perform(path, ObjectAction::ClearSelection)
    }

    pub fn key_event(&self, path: &str, key: &str) -> ApiResult<()> {
        self.perform(path, ObjectAction::Key(key.to_string()))
    }

    pub fn close(&self, path: &str) -> ApiResult<()> {
        self.perform(path, ObjectAction::Close)
    }

    /// Compare a property's string form against `expected`, retrying with
    /// the verify policy
    pub fn verify(&self, path: &str, property: &str, expected: &str) -> ApiResult<()> {
        self.check_cancelled()?;
        let attempts = self.config.verify_attempts;
        let id = self.find(path)?;
        let object = self.handle(path, id)?;
        self.report.lock().record_path(path);

        let mut actual = None;
        for attempt in 1..=attempts {
            let probe = object.clone();
            let key = property.to_string();
            let value = self.on_gui(move || probe.get(&key))?;
            let Some(value) = value else {
                self.record_verification(path, property, expected, None, false, attempt);
                return Err(ScriptError::UnknownProperty {
                    path: path.to_string(),
                    property: property.to_string(),
                });
            };
            let text = value.to_string();
            if text == expected {
                self.record_verification(path, property, expected, Some(text), true, attempt);
                debug!(path, property, attempt, "Verification passed");
                return Ok(());
            }
            actual = Some(text);
            if attempt < attempts {
                self.sleep(self.config.verify_interval())?;
            }
        }

        self.record_verification(path, property, expected, actual.clone(), false, attempts);
        Err(ScriptError::VerifyFailed {
            path: path.to_string(),
            property: property.to_string(),
            expected: expected.to_string(),
            actual: actual.unwrap_or_default(),
            attempts,
            interval_ms: self.config.verify_interval_ms,
        })
    }

    fn record_verification(
        &self,
        path: &str,
        property: &str,
        expected: &str,
        actual: Option<String>,
        passed: bool,
        attempts: u32,
    ) {
        self.report.lock().record_verification(VerificationRecord {
            path: path.to_string(),
            property: property.to_string(),
            expected: expected.to_string(),
            actual,
            passed,
            attempts,
        });
    }
}

/// Split `'text_3'` into `("text", 3)`
pub fn split_text_index(text: &str) -> Option<(&str, i32)> {
    let (base, index) = text.rsplit_once('_')?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((base, index.parse().ok()?))
}

/// Selector for `selectItem` and `selectTabItem` text arguments
pub fn text_selector(text: &str, known: impl Fn(&str) -> bool) -> ItemSelector {
    if known(text) {
        return ItemSelector::Text(text.to_string());
    }
    match split_text_index(text) {
        Some((_, index)) => ItemSelector::Index(index),
        None => ItemSelector::Text(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gui::GuiLoop;
    use crate::host::{MemoryHost, MemoryObject, WidgetClass};

    struct Fixture {
        _gui: GuiLoop,
        host: MemoryHost,
        api: ActionApi,
        window: Arc<MemoryObject>,
    }

    fn fixture() -> Fixture {
        let gui = GuiLoop::new();
        let tracker = ObjectTracker::new(gui.handle());
        let host = MemoryHost::new();
        host.attach(tracker.clone());
        let registry = ObjectRegistry::attach(&tracker);
        let window = host.create_root("MainWindow", "main", Some(WidgetClass::Window));
        let config = RunConfig {
            retrieval_attempts: 3,
            retrieval_interval_ms: 10,
            verify_attempts: 2,
            verify_interval_ms: 10,
            ..Default::default()
        };
        let api = ActionApi::new(
            gui.handle(),
            tracker,
            registry,
            config,
            Arc::new(AtomicBool::new(false)),
            Arc::new(Mutex::new(RunReport::new("test.lua"))),
        );
        Fixture {
            _gui: gui,
            host,
            api,
            window,
        }
    }

    // Calls run inline here: the test thread is the GUI home thread.

    #[test]
    fn test_check_button_toggles_only_when_needed() {
        let f = fixture();
        let check = f.host.create(&f.window, "CheckBox", "agree", Some(WidgetClass::CheckBox));

        f.api.check_button("n=main_0/n=agree_0", true).unwrap();
        assert_eq!(check.property("checked"), Some(Value::Bool(true)));
        f.api.check_button("n=main_0/n=agree_0", true).unwrap();
        assert_eq!(check.performed().len(), 1);
    }

    #[test]
    fn test_not_found_names_path() {
        let f = fixture();
        let err = f.api.button_click("n=main_0/n=missing_0", false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to find the object at path 'n=main_0/n=missing_0' after 3 attempts with an interval of 10 ms"
        );
    }

    #[test]
    fn test_disabled_object_is_not_available() {
        let f = fixture();
        let ok = f.host.create(&f.window, "PushButton", "ok", Some(WidgetClass::Button));
        ok.set_property("enabled", false);

        let err = f.api.button_click("n=main_0/n=ok_0", false).unwrap_err();
        assert!(matches!(err, ScriptError::NotAvailable { ref reason, .. } if reason == "not enabled"));
        assert!(ok.performed().is_empty());
    }

    #[test]
    fn test_verify_mismatch_reports_values() {
        let f = fixture();
        let label = f.host.create(&f.window, "Label", "status", None);
        label.set_property("text", "Idle");

        f.api.verify("n=main_0/n=status_0", "text", "Idle").unwrap();
        let err = f.api.verify("n=main_0/n=status_0", "text", "Done").unwrap_err();
        assert_eq!(
            err,
            ScriptError::VerifyFailed {
                path: "n=main_0/n=status_0".into(),
                property: "text".into(),
                expected: "Done".into(),
                actual: "Idle".into(),
                attempts: 2,
                interval_ms: 10,
            }
        );
        let err = f.api.verify("n=main_0/n=status_0", "colour", "red").unwrap_err();
        assert!(matches!(err, ScriptError::UnknownProperty { .. }));

        let report = f.api.report().lock();
        assert_eq!(report.verifications.len(), 3);
        assert!(report.verifications[0].passed);
        assert!(!report.verifications[1].passed);
    }

    #[test]
    fn test_value_and_text_actions() {
        let f = fixture();
        let spin = f.host.create(&f.window, "SpinBox", "count", Some(WidgetClass::SpinBox));
        spin.set_property("value", 1);
        spin.set_property("maximum", 2);

        f.api.change_value("n=main_0/n=count_0", "Up").unwrap();
        assert_eq!(spin.property("value"), Some(Value::Int(2)));
        assert!(f.api.change_value("n=main_0/n=count_0", "Up").is_err());
        assert!(matches!(
            f.api.change_value("n=main_0/n=count_0", "Sideways"),
            Err(ScriptError::InvalidArgument(_))
        ));

        f.api.set_text("n=main_0/n=count_0", "7").unwrap();
        assert_eq!(spin.property("text"), Some(Value::from("7")));
    }

    #[test]
    fn test_item_text_selectors() {
        let f = fixture();
        let combo = f.host.create(&f.window, "ComboBox", "size", Some(WidgetClass::ComboBox));
        combo.set_items(&["Small", "Large", "Large"]);

        let selector = f.api.item_selector("n=main_0/n=size_0", "Large").unwrap();
        assert_eq!(selector, ItemSelector::Text("Large".into()));
        let selector = f.api.item_selector("n=main_0/n=size_0", "Large_2").unwrap();
        assert_eq!(selector, ItemSelector::Index(2));

        f.api.select_item("n=main_0/n=size_0", selector).unwrap();
        assert_eq!(combo.property("currentIndex"), Some(Value::Int(2)));

        let list = f.host.create(&f.window, "ListView", "files", Some(WidgetClass::ItemView));
        list.set_items(&["a.txt", "b.txt"]);
        f.api
            .delegate_click("n=main_0/n=files_0", ItemTarget::Text("b.txt".into()), false)
            .unwrap();
        assert_eq!(
            list.performed(),
            vec![ObjectAction::ClickItem {
                index: vec![1],
                double: false
            }]
        );
    }

    #[test]
    fn test_cancel_stops_actions() {
        let f = fixture();
        f.host.create(&f.window, "PushButton", "ok", Some(WidgetClass::Button));
        f.api.cancel.store(true, Ordering::SeqCst);
        assert_eq!(
            f.api.button_click("n=main_0/n=ok_0", false),
            Err(ScriptError::Cancelled)
        );
        assert_eq!(f.api.sleep(Duration::from_secs(5)), Err(ScriptError::Cancelled));
    }

    #[test]
    fn test_split_text_index() {
        assert_eq!(split_text_index("Large_2"), Some(("Large", 2)));
        assert_eq!(split_text_index("my_file_10"), Some(("my_file", 10)));
        assert_eq!(split_text_index("plain"), None);
        assert_eq!(split_text_index("trailing_"), None);
    }
}
