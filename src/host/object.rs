//! Live Object Types
//!
//! Vocabulary shared by the tracker, the classifier and the runner: object
//! handles, property values, interactive widget classes and the actions the
//! runner can ask an object to perform.

use crate::capture::types::MouseButton;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Native identity of a live object, stable for the object's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position in object-local coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Object size in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Center point of an object with this size
    pub fn center(&self) -> Point {
        Point::new(self.width / 2, self.height / 2)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0 && point.y >= 0 && point.x < self.width && point.y < self.height
    }
}

/// Interactive widget classes the classifier and runner understand.
///
/// Returned by [`LiveObject::class`], the capability probe. Objects that match
/// no variant are still tracked and addressable, they just get generic
/// mouse/key treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetClass {
    /// Push or tool button, possibly checkable
    Button,
    /// Check box
    CheckBox,
    /// Radio button
    RadioButton,
    /// Slider, dial or scroll bar
    Slider,
    /// Integer or floating spin box
    SpinBox,
    /// Combo box with a popup item view
    ComboBox,
    /// Flat list or table view
    ItemView,
    /// Hierarchical item view
    TreeView,
    /// Tab bar
    TabBar,
    /// Popup menu
    Menu,
    /// Menu bar
    MenuBar,
    /// Single or multi line text editor
    TextInput,
    /// Modal or modeless dialog
    Dialog,
    /// Top-level window
    Window,
}

impl WidgetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetClass::Button => "button",
            WidgetClass::CheckBox => "check box",
            WidgetClass::RadioButton => "radio button",
            WidgetClass::Slider => "slider",
            WidgetClass::SpinBox => "spin box",
            WidgetClass::ComboBox => "combo box",
            WidgetClass::ItemView => "item view",
            WidgetClass::TreeView => "tree view",
            WidgetClass::TabBar => "tab bar",
            WidgetClass::Menu => "menu",
            WidgetClass::MenuBar => "menu bar",
            WidgetClass::TextInput => "text input",
            WidgetClass::Dialog => "dialog",
            WidgetClass::Window => "window",
        }
    }

    /// Classes that own a close action
    pub fn is_top_level(&self) -> bool {
        matches!(self, WidgetClass::Dialog | WidgetClass::Window)
    }

    /// Classes with a button-like press/release gesture
    pub fn is_button_like(&self) -> bool {
        matches!(
            self,
            WidgetClass::Button | WidgetClass::CheckBox | WidgetClass::RadioButton
        )
    }
}

impl fmt::Display for WidgetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property value exchanged through [`LiveObject::get`] and [`LiveObject::set`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render as a script literal (strings quoted and escaped)
    pub fn to_script_literal(&self) -> String {
        match self {
            Value::Null => "nil".to_string(),
            Value::Text(s) => format!("'{}'", crate::script::action::escape_text(s)),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_script_literal).collect();
                format!("{{{}}}", inner.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// String form used by `verify` comparisons
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// An item inside an item view, combo popup or tab bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    /// Row path from the top level; a single entry for flat models
    pub rows: Vec<i32>,
    /// Column of the cell
    pub column: i32,
    /// Display text
    pub text: String,
}

impl ItemRef {
    pub fn flat(row: i32, column: i32, text: impl Into<String>) -> Self {
        Self {
            rows: vec![row],
            column,
            text: text.into(),
        }
    }

    /// Row within the immediate parent
    pub fn row(&self) -> i32 {
        self.rows.last().copied().unwrap_or(0)
    }

    pub fn is_nested(&self) -> bool {
        self.rows.len() > 1
    }
}

/// Item selection by index or display text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemSelector {
    Index(i32),
    Text(String),
}

/// One coordinate of a selected cell; `All` spans the whole row or column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellIndex {
    At(i32),
    All,
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellIndex::At(i) => write!(f, "{}", i),
            CellIndex::All => f.write_str("'ALL'"),
        }
    }
}

/// A selected cell or a compressed row/column span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionCell {
    pub row: CellIndex,
    pub column: CellIndex,
}

/// Operations the runner asks a live object to perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectAction {
    /// Click a button-like object
    Click { double: bool },
    /// Press and hold a button-like object
    Press,
    /// Synthesized mouse click at a local position
    MouseClick {
        button: MouseButton,
        pos: Point,
        double: bool,
    },
    /// Step a spin box up (positive) or down (negative)
    Step(i32),
    /// Select an item of a combo box or tab bar
    SelectItem(ItemSelector),
    /// Click an item of an item view
    ClickItem { index: Vec<i32>, double: bool },
    /// Expand a tree item
    Expand(Vec<i32>),
    /// Collapse a tree item
    Collapse(Vec<i32>),
    /// Trigger a menu action
    Trigger { checked: Option<bool> },
    /// Replace the selection of an item view
    SetSelection(Vec<SelectionCell>),
    /// Clear the selection of an item view
    ClearSelection,
    /// Edit the text of an item inside a view
    SetItemText { index: Vec<i32>, text: String },
    /// Deliver a key press
    Key(String),
    /// Close a dialog or window
    Close,
}

impl ObjectAction {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ObjectAction::Click { .. } => "click",
            ObjectAction::Press => "press",
            ObjectAction::MouseClick { .. } => "mouse_click",
            ObjectAction::Step(_) => "step",
            ObjectAction::SelectItem(_) => "select_item",
            ObjectAction::ClickItem { .. } => "click_item",
            ObjectAction::Expand(_) => "expand",
            ObjectAction::Collapse(_) => "collapse",
            ObjectAction::Trigger { .. } => "trigger",
            ObjectAction::SetSelection(_) => "set_selection",
            ObjectAction::ClearSelection => "clear_selection",
            ObjectAction::SetItemText { .. } => "set_item_text",
            ObjectAction::Key(_) => "key",
            ObjectAction::Close => "close",
        }
    }
}

/// Errors reported by a host object
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("property '{0}' is read-only")]
    ReadOnly(String),

    #[error("invalid value for '{property}': {reason}")]
    InvalidValue { property: String, reason: String },

    #[error("action '{0}' is not supported by this object")]
    Unsupported(String),

    #[error("object no longer exists")]
    Gone,
}

/// A node of the host application's object graph.
///
/// Implementations are owned by the host; the engine keeps only weak handles.
/// All methods except the identity accessors must be called on the GUI thread.
pub trait LiveObject: Send + Sync {
    /// Native identity
    fn id(&self) -> ObjectId;

    /// Runtime type name, possibly carrying generated suffixes
    fn type_name(&self) -> String;

    /// User-assigned name, empty if none
    fn object_name(&self) -> String;

    fn parent(&self) -> Option<Arc<dyn LiveObject>>;

    /// Children in host order
    fn children(&self) -> Vec<Arc<dyn LiveObject>>;

    /// Capability probe
    fn class(&self) -> Option<WidgetClass> {
        None
    }

    /// Read a property; `None` if the object has no such property
    fn get(&self, property: &str) -> Option<Value>;

    /// Write a property
    fn set(&self, property: &str, value: Value) -> Result<(), HostError>;

    /// Perform an interactive operation
    fn perform(&self, action: &ObjectAction) -> Result<(), HostError>;

    fn is_visible(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn size(&self) -> Size {
        Size::default()
    }

    /// Item under a local position, for views that hold items
    fn item_at(&self, _pos: Point) -> Option<ItemRef> {
        None
    }

    /// First top-level item with the given display text
    fn find_item(&self, _text: &str) -> Option<ItemRef> {
        None
    }
}
