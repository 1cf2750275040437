//! Lua Interpreter
//!
//! Runs a script on a dedicated thread in a sandboxed Lua state that only
//! has the `table`, `string` and `math` libraries plus the action API.

use super::api::{lua_error, ActionApi, ItemTarget, ScriptError};
use super::registry::ObjectRegistry;
use super::report::{LogCategory, RunReport};
use super::{RunConfig, EXIT_FAILURE, EXIT_SUCCESS};
use crate::capture::types::MouseButton;
use crate::gui::{GuiHandle, GuiLoop};
use crate::host::{CellIndex, ItemSelector, Point, SelectionCell, Value};
use crate::tracker::ObjectTracker;
use mlua::{Lua, LuaOptions, StdLib, Value as LuaValue};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Functions installed into every script's globals
pub const API_FUNCTIONS: &[&str] = &[
    "mouseClick",
    "mouseDblClick",
    "buttonClick",
    "buttonDblClick",
    "buttonPress",
    "checkButton",
    "selectItem",
    "setValue",
    "changeValue",
    "setText",
    "delegateClick",
    "delegateDblClick",
    "triggerAction",
    "expandDelegate",
    "collapseDelegate",
    "setSelection",
    "clearSelection",
    "selectTabItem",
    "keyEvent",
    "closeDialog",
    "closeWindow",
    "verify",
    "waitFor",
    "wait",
    "log",
];

static LINE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+):").expect("valid regex"));

static API_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({})\s*\(", API_FUNCTIONS.join("|"))).expect("valid regex")
});

/// A script that stopped with an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFailure {
    pub message: String,
    /// 1-based script line, when known
    pub line: Option<usize>,
    pub stack: String,
}

impl ScriptFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            stack: String::new(),
        }
    }

    /// Extract message, line and stack from an interpreter error
    pub fn from_lua(error: &mlua::Error, chunk: &str) -> Self {
        let (message, traceback) = match error {
            mlua::Error::CallbackError { traceback, cause } => {
                (root_cause(cause).to_string(), traceback.clone())
            }
            mlua::Error::SyntaxError { message, .. } => (message.clone(), String::new()),
            mlua::Error::RuntimeError(message) => match message.split_once("\nstack traceback:") {
                Some((message, rest)) => (message.to_string(), format!("stack traceback:{}", rest)),
                None => (message.clone(), String::new()),
            },
            other => (other.to_string(), String::new()),
        };

        let line = extract_line(&message).or_else(|| extract_line(&traceback));
        let stack = if traceback.is_empty() {
            match line {
                Some(line) => format!("stack traceback:\n\t[string \"{}\"]:{}: in main chunk", chunk, line),
                None => format!("stack traceback:\n\t[string \"{}\"]: in main chunk", chunk),
            }
        } else {
            traceback
        };
        Self {
            message,
            line,
            stack,
        }
    }
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {})", self.message, line),
            None => f.write_str(&self.message),
        }
    }
}

fn root_cause(error: &mlua::Error) -> &mlua::Error {
    match error {
        mlua::Error::CallbackError { cause, .. } => root_cause(cause),
        other => other,
    }
}

fn extract_line(text: &str) -> Option<usize> {
    LINE_NUMBER
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// 0 on success, 1 on failure
    pub exit_code: i32,
    pub failure: Option<ScriptFailure>,
    pub report: RunReport,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == EXIT_SUCCESS
    }
}

/// A script running on its own thread
pub struct RunHandle {
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<RunOutcome>>,
}

impl RunHandle {
    /// Ask the script to stop before its next action
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn join(mut self) -> crate::Result<RunOutcome> {
        let thread = self
            .thread
            .take()
            .ok_or_else(|| crate::Error::Runner("run already joined".to_string()))?;
        thread
            .join()
            .map_err(|_| crate::Error::Runner("runner thread panicked".to_string()))
    }

    /// Pump `gui` until the script ends, cancelling it after `timeout`
    pub fn wait(self, gui: &GuiLoop, timeout: Duration) -> crate::Result<RunOutcome> {
        if !gui.run_until(timeout, || self.is_finished()) {
            self.cancel();
            if !gui.run_until(Duration::from_secs(5), || self.is_finished()) {
                return Err(crate::Error::Runner(format!(
                    "script did not finish within {} ms",
                    timeout.as_millis()
                )));
            }
        }
        self.join()
    }
}

/// Starts scripts against one live application
pub struct ScriptRunner {
    gui: GuiHandle,
    tracker: Arc<ObjectTracker>,
    registry: Arc<ObjectRegistry>,
    config: RunConfig,
}

impl ScriptRunner {
    pub fn new(gui: GuiHandle, tracker: Arc<ObjectTracker>, config: RunConfig) -> crate::Result<Self> {
        config.validate()?;
        let registry = ObjectRegistry::attach(&tracker);
        Ok(Self {
            gui,
            tracker,
            registry,
            config,
        })
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// Read `script` and run it on a new thread
    pub fn start(&self, script: &Path) -> crate::Result<RunHandle> {
        let source = std::fs::read_to_string(script)?;
        let name = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| script.display().to_string());
        self.start_source(&name, source)
    }

    /// Run `source` on a new thread; `name` labels errors and the report
    pub fn start_source(&self, name: &str, source: String) -> crate::Result<RunHandle> {
        let cancel = Arc::new(AtomicBool::new(false));
        let report = Arc::new(Mutex::new(RunReport::new(name)));
        let api = Arc::new(ActionApi::new(
            self.gui.clone(),
            self.tracker.clone(),
            self.registry.clone(),
            self.config.clone(),
            cancel.clone(),
            report,
        ));
        let name = name.to_string();
        let thread = thread::Builder::new()
            .name("script-runner".to_string())
            .spawn(move || execute(api, &name, &source))?;
        Ok(RunHandle {
            cancel,
            thread: Some(thread),
        })
    }
}

fn execute(api: Arc<ActionApi>, name: &str, source: &str) -> RunOutcome {
    api.log(LogCategory::Info, format!("Running script '{}'", name));

    let result = if source.trim().is_empty() {
        Err(ScriptFailure::new("Script is empty"))
    } else {
        run_lua(api.clone(), name, source).map_err(|e| ScriptFailure::from_lua(&e, name))
    };

    let exit_code = match &result {
        Ok(()) => {
            api.log(LogCategory::Success, format!("Script '{}' passed", name));
            EXIT_SUCCESS
        }
        Err(failure) => {
            api.log(LogCategory::Error, failure.to_string());
            debug!(stack = %failure.stack, "Script failure stack");
            EXIT_FAILURE
        }
    };

    let report = {
        let mut report = api.report().lock();
        report.finish(exit_code);
        report.clone()
    };
    info!(script = name, exit_code, "Script finished");
    RunOutcome {
        exit_code,
        failure: result.err(),
        report,
    }
}

fn sandbox() -> mlua::Result<Lua> {
    Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH,
        LuaOptions::default(),
    )
}

fn run_lua(api: Arc<ActionApi>, name: &str, source: &str) -> mlua::Result<()> {
    let lua = sandbox()?;
    install(&lua, api)?;
    lua.load(source).set_name(name).exec()
}

fn to_host_value(value: LuaValue) -> mlua::Result<Value> {
    Ok(match value {
        LuaValue::Nil => Value::Null,
        LuaValue::Boolean(b) => Value::Bool(b),
        LuaValue::Integer(i) => Value::Int(i),
        LuaValue::Number(n) => Value::Float(n),
        LuaValue::String(s) => Value::Text(s.to_str()?.to_string()),
        LuaValue::Table(t) => Value::List(
            t.sequence_values::<LuaValue>()
                .map(|v| v.and_then(to_host_value))
                .collect::<mlua::Result<Vec<_>>>()?,
        ),
        other => {
            return Err(mlua::Error::FromLuaConversionError {
                from: other.type_name(),
                to: "Value",
                message: None,
            })
        }
    })
}

/// Whole Lua number that fits an `i32`; fractions and overflow are rejected
fn to_i32(value: &LuaValue) -> mlua::Result<i32> {
    let converted = match *value {
        LuaValue::Integer(i) => i32::try_from(i).ok(),
        LuaValue::Number(n) => (n.fract() == 0.0
            && n >= f64::from(i32::MIN)
            && n <= f64::from(i32::MAX))
        .then_some(n as i32),
        _ => None,
    };
    converted.ok_or_else(|| {
        let shown = match *value {
            LuaValue::Integer(i) => i.to_string(),
            LuaValue::Number(n) => n.to_string(),
            ref other => other.type_name().to_string(),
        };
        lua_error(ScriptError::InvalidArgument(format!(
            "expected a whole number index, got {}",
            shown
        )))
    })
}

fn to_index_path(value: LuaValue) -> mlua::Result<Vec<i32>> {
    match value {
        LuaValue::Integer(_) | LuaValue::Number(_) => Ok(vec![to_i32(&value)?]),
        LuaValue::Table(t) => t
            .sequence_values::<LuaValue>()
            .map(|v| v.and_then(|v| to_i32(&v)))
            .collect(),
        other => Err(mlua::Error::FromLuaConversionError {
            from: other.type_name(),
            to: "index path",
            message: Some("expected a number or a table of numbers".to_string()),
        }),
    }
}

fn to_item_target(value: LuaValue) -> mlua::Result<ItemTarget> {
    match value {
        LuaValue::String(s) => Ok(ItemTarget::Text(s.to_str()?.to_string())),
        other => to_index_path(other).map(ItemTarget::Index),
    }
}

fn to_selector(api: &ActionApi, path: &str, value: LuaValue) -> mlua::Result<ItemSelector> {
    match value {
        LuaValue::Integer(_) | LuaValue::Number(_) => Ok(ItemSelector::Index(to_i32(&value)?)),
        LuaValue::String(s) => api.item_selector(path, s.to_str()?).map_err(lua_error),
        other => Err(mlua::Error::FromLuaConversionError {
            from: other.type_name(),
            to: "item selector",
            message: Some("expected an index or an item text".to_string()),
        }),
    }
}

fn to_cell_index(value: LuaValue) -> mlua::Result<CellIndex> {
    match value {
        LuaValue::Integer(_) | LuaValue::Number(_) => Ok(CellIndex::At(to_i32(&value)?)),
        LuaValue::String(s) if s.to_str()? == "ALL" => Ok(CellIndex::All),
        other => Err(mlua::Error::FromLuaConversionError {
            from: other.type_name(),
            to: "cell index",
            message: Some("expected a number or 'ALL'".to_string()),
        }),
    }
}

fn to_cells(value: LuaValue) -> mlua::Result<Vec<SelectionCell>> {
    let table = match value {
        LuaValue::Table(table) => table,
        other => {
            return Err(mlua::Error::FromLuaConversionError {
                from: other.type_name(),
                to: "selection",
                message: Some("expected a table of {row, column} pairs".to_string()),
            })
        }
    };
    table
        .sequence_values::<mlua::Table>()
        .map(|cell| {
            let cell = cell?;
            Ok(SelectionCell {
                row: to_cell_index(cell.get(1)?)?,
                column: to_cell_index(cell.get(2)?)?,
            })
        })
        .collect()
}

fn parse_button(name: &str) -> mlua::Result<MouseButton> {
    name.parse::<MouseButton>()
        .map_err(|e| lua_error(ScriptError::InvalidArgument(e)))
}

/// Install the action API into the globals of `lua`
fn install(lua: &Lua, api: Arc<ActionApi>) -> mlua::Result<()> {
    let globals = lua.globals();

    for (name, double) in [("mouseClick", false), ("mouseDblClick", true)] {
        let a = api.clone();
        globals.set(
            name,
            lua.create_function(move |_, (path, button, x, y): (String, String, i32, i32)| {
                let button = parse_button(&button)?;
                a.mouse_click(&path, button, Point::new(x, y), double)
                    .map_err(lua_error)
            })?,
        )?;
    }

    for (name, double) in [("buttonClick", false), ("buttonDblClick", true)] {
        let a = api.clone();
        globals.set(
            name,
            lua.create_function(move |_, path: String| {
                a.button_click(&path, double).map_err(lua_error)
            })?,
        )?;
    }

    let a = api.clone();
    globals.set(
        "buttonPress",
        lua.create_function(move |_, path: String| a.button_press(&path).map_err(lua_error))?,
    )?;

    let a = api.clone();
    globals.set(
        "checkButton",
        lua.create_function(move |_, (path, checked): (String, bool)| {
            a.check_button(&path, checked).map_err(lua_error)
        })?,
    )?;

    for name in ["selectItem", "selectTabItem"] {
        let a = api.clone();
        globals.set(
            name,
            lua.create_function(move |_, (path, item): (String, LuaValue)| {
                let selector = to_selector(&a, &path, item)?;
                a.select_item(&path, selector).map_err(lua_error)
            })?,
        )?;
    }

    let a = api.clone();
    globals.set(
        "setValue",
        lua.create_function(
            move |_, (path, value, second): (String, LuaValue, Option<LuaValue>)| {
                let value = to_host_value(value)?;
                let second = second.map(to_host_value).transpose()?;
                a.set_value(&path, value, second).map_err(lua_error)
            },
        )?,
    )?;

    let a = api.clone();
    globals.set(
        "changeValue",
        lua.create_function(move |_, (path, direction): (String, String)| {
            a.change_value(&path, &direction).map_err(lua_error)
        })?,
    )?;

    let a = api.clone();
    globals.set(
        "setText",
        lua.create_function(
            move |_, (path, second, third): (String, LuaValue, Option<String>)| match third {
                Some(text) => a
                    .set_item_text(&path, to_index_path(second)?, &text)
                    .map_err(lua_error),
                None => {
                    let text = to_host_value(second)?.to_string();
                    a.set_text(&path, &text).map_err(lua_error)
                }
            },
        )?,
    )?;

    for (name, double) in [("delegateClick", false), ("delegateDblClick", true)] {
        let a = api.clone();
        globals.set(
            name,
            lua.create_function(move |_, (path, item): (String, LuaValue)| {
                let target = to_item_target(item)?;
                a.delegate_click(&path, target, double).map_err(lua_error)
            })?,
        )?;
    }

    let a = api.clone();
    globals.set(
        "triggerAction",
        lua.create_function(move |_, (path, checked): (String, Option<bool>)| {
            a.trigger_action(&path, checked).map_err(lua_error)
        })?,
    )?;

    for (name, expand) in [("expandDelegate", true), ("collapseDelegate", false)] {
        let a = api.clone();
        globals.set(
            name,
            lua.create_function(move |_, (path, rows): (String, LuaValue)| {
                let rows = to_index_path(rows)?;
                a.expand_delegate(&path, rows, expand).map_err(lua_error)
            })?,
        )?;
    }

    let a = api.clone();
    globals.set(
        "setSelection",
        lua.create_function(move |_, (path, cells): (String, LuaValue)| {
            let cells = to_cells(cells)?;
            a.set_selection(&path, cells).map_err(lua_error)
        })?,
    )?;

    let a = api.clone();
    globals.set(
        "clearSelection",
        lua.create_function(move |_, path: String| a.clear_selection(&path).map_err(lua_error))?,
    )?;

    let a = api.clone();
    globals.set(
        "keyEvent",
        lua.create_function(move |_, (path, key): (String, String)| {
            a.key_event(&path, &key).map_err(lua_error)
        })?,
    )?;

    for name in ["closeDialog", "closeWindow"] {
        let a = api.clone();
        globals.set(
            name,
            lua.create_function(move |_, path: String| a.close(&path).map_err(lua_error))?,
        )?;
    }

    let a = api.clone();
    globals.set(
        "verify",
        lua.create_function(
            move |_, (path, property, expected): (String, String, LuaValue)| {
                let expected = to_host_value(expected)?.to_string();
                a.verify(&path, &property, &expected).map_err(lua_error)
            },
        )?,
    )?;

    let a = api.clone();
    globals.set(
        "waitFor",
        lua.create_function(move |_, (path, seconds): (String, Option<f64>)| {
            let timeout = seconds.map(|s| Duration::from_secs_f64(s.max(0.0)));
            a.wait_for(&path, timeout).map_err(lua_error)
        })?,
    )?;

    let a = api.clone();
    globals.set(
        "wait",
        lua.create_function(move |_, seconds: f64| {
            a.sleep(Duration::from_secs_f64(seconds.max(0.0)))
                .map_err(lua_error)
        })?,
    )?;

    let a = api;
    globals.set(
        "log",
        lua.create_function(move |_, message: LuaValue| {
            let message = to_host_value(message)?.to_string();
            a.log(LogCategory::Info, message);
            Ok(())
        })?,
    )?;

    Ok(())
}

/// Summary of a compiled script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCheck {
    /// Calls per action function, outside comments
    pub calls: BTreeMap<String, usize>,
    pub lines: usize,
}

impl ScriptCheck {
    pub fn total_calls(&self) -> usize {
        self.calls.values().sum()
    }
}

/// Compile `path` without running it and count its action calls
pub fn check_script(path: &Path) -> crate::Result<ScriptCheck> {
    let source = std::fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    check_source(&name, &source)
}

/// [`check_script`] for in-memory source
pub fn check_source(name: &str, source: &str) -> crate::Result<ScriptCheck> {
    if source.trim().is_empty() {
        return Err(crate::Error::Script(format!("script '{}' is empty", name)));
    }
    let lua = sandbox()?;
    if let Err(e) = lua.load(source).set_name(name).into_function() {
        return Err(crate::Error::Script(ScriptFailure::from_lua(&e, name).to_string()));
    }

    let mut check = ScriptCheck {
        lines: source.lines().count(),
        ..Default::default()
    };
    let mut in_block = false;
    for line in source.lines() {
        let code = strip_comments(line, &mut in_block);
        for call in API_CALL.captures_iter(&code) {
            *check.calls.entry(call[1].to_string()).or_insert(0) += 1;
        }
    }
    Ok(check)
}

/// Code part of a line, tracking `--[[ ]]` blocks across lines
fn strip_comments(line: &str, in_block: &mut bool) -> String {
    let mut rest = line;
    let mut code = String::new();
    loop {
        if *in_block {
            match rest.find("]]") {
                Some(end) => {
                    *in_block = false;
                    rest = &rest[end + 2..];
                }
                None => return code,
            }
        }
        match rest.find("--") {
            Some(start) => {
                code.push_str(&rest[..start]);
                let comment = &rest[start + 2..];
                if comment.starts_with("[[") {
                    *in_block = true;
                    rest = &comment[2..];
                } else {
                    return code;
                }
            }
            None => {
                code.push_str(rest);
                return code;
            }
        }
    }
}
