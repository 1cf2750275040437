//! Core types for event capture
//!
//! Raw input events delivered by the host on the GUI thread, and the
//! confirmation signals that settle delayed classifications.

use crate::host::{ObjectId, Point, Value};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw input event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Mouse button pressed
    MousePress,
    /// Mouse button released
    MouseRelease,
    /// Platform double-click (delivered instead of the second press)
    MouseDoubleClick,
    /// Pointer moved
    MouseMove,
    /// Mouse wheel or trackpad scroll
    Wheel,
    /// Key pressed
    KeyPress,
    /// Key released
    KeyRelease,
    /// Keyboard focus left the target
    FocusOut,
    /// The target is being closed
    Close,
}

impl EventKind {
    /// Press-type events start a gesture
    pub fn is_press(&self) -> bool {
        matches!(self, EventKind::MousePress | EventKind::MouseDoubleClick)
    }

    pub fn is_mouse(&self) -> bool {
        matches!(
            self,
            EventKind::MousePress
                | EventKind::MouseRelease
                | EventKind::MouseDoubleClick
                | EventKind::MouseMove
                | EventKind::Wheel
        )
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self, EventKind::KeyPress | EventKind::KeyRelease)
    }
}

/// Mouse buttons, named the way scripts spell them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
    Back,
    Forward,
    None,
}

impl MouseButton {
    pub fn as_script_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "LeftButton",
            MouseButton::Right => "RightButton",
            MouseButton::Middle => "MiddleButton",
            MouseButton::Back => "BackButton",
            MouseButton::Forward => "ForwardButton",
            MouseButton::None => "NoButton",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_script_str())
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LeftButton" => Ok(MouseButton::Left),
            "RightButton" => Ok(MouseButton::Right),
            "MiddleButton" => Ok(MouseButton::Middle),
            "BackButton" => Ok(MouseButton::Back),
            "ForwardButton" => Ok(MouseButton::Forward),
            "NoButton" => Ok(MouseButton::None),
            other => Err(format!("unknown mouse button '{}'", other)),
        }
    }
}

/// Non-text keys the classifier distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Return,
    Enter,
    Escape,
    Tab,
    Backspace,
    Delete,
    Space,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
    /// Printable key; the event's `text` carries the character
    Character,
    Other(u32),
}

impl KeyCode {
    /// Name used in `keyEvent` lines
    pub fn name(&self) -> String {
        match self {
            KeyCode::Return => "Return".to_string(),
            KeyCode::Enter => "Enter".to_string(),
            KeyCode::Escape => "Esc".to_string(),
            KeyCode::Tab => "Tab".to_string(),
            KeyCode::Backspace => "Backspace".to_string(),
            KeyCode::Delete => "Del".to_string(),
            KeyCode::Space => "Space".to_string(),
            KeyCode::Up => "Up".to_string(),
            KeyCode::Down => "Down".to_string(),
            KeyCode::Left => "Left".to_string(),
            KeyCode::Right => "Right".to_string(),
            KeyCode::Home => "Home".to_string(),
            KeyCode::End => "End".to_string(),
            KeyCode::PageUp => "PgUp".to_string(),
            KeyCode::PageDown => "PgDown".to_string(),
            KeyCode::F(n) => format!("F{}", n),
            KeyCode::Character => "Character".to_string(),
            KeyCode::Other(code) => format!("Key_{:#x}", code),
        }
    }

    /// Keys that commit a text input
    pub fn is_commit(&self) -> bool {
        matches!(self, KeyCode::Return | KeyCode::Enter)
    }
}

/// Keyboard modifier flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Check if any modifier other than shift is active
    pub fn has_command_modifier(&self) -> bool {
        self.control || self.alt || self.meta
    }
}

/// A raw input event targeted at a live object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: EventKind,
    /// Receiving object
    pub target: ObjectId,
    pub timestamp: Timestamp,
    /// Button that changed state (mouse events)
    pub button: MouseButton,
    /// Pointer position in target-local coordinates
    pub pos: Point,
    /// Key code (keyboard events)
    pub key: Option<KeyCode>,
    /// Text produced by a key press
    pub text: String,
    pub modifiers: Modifiers,
}

impl InputEvent {
    /// Create a mouse event
    pub fn mouse(
        kind: EventKind,
        target: ObjectId,
        button: MouseButton,
        pos: Point,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            kind,
            target,
            timestamp,
            button,
            pos,
            key: None,
            text: String::new(),
            modifiers: Modifiers::default(),
        }
    }

    /// Create a key press carrying text
    pub fn key_press(target: ObjectId, key: KeyCode, text: &str, timestamp: Timestamp) -> Self {
        Self {
            kind: EventKind::KeyPress,
            target,
            timestamp,
            button: MouseButton::None,
            pos: Point::default(),
            key: Some(key),
            text: text.to_string(),
            modifiers: Modifiers::default(),
        }
    }

    /// Create a printable key press for one character
    pub fn char_press(target: ObjectId, ch: char, timestamp: Timestamp) -> Self {
        Self::key_press(target, KeyCode::Character, &ch.to_string(), timestamp)
    }

    /// Create an event with no payload (focus out, close)
    pub fn plain(kind: EventKind, target: ObjectId, timestamp: Timestamp) -> Self {
        Self {
            kind,
            target,
            timestamp,
            button: MouseButton::None,
            pos: Point::default(),
            key: None,
            text: String::new(),
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Printable text without control characters
    pub fn printable_text(&self) -> Option<&str> {
        if self.text.is_empty() || self.text.chars().any(char::is_control) {
            None
        } else {
            Some(&self.text)
        }
    }
}

/// Confirmation signal payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalKind {
    /// A slider or spin box value changed
    ValueChanged(Value),
    /// The current index of a combo box or tab bar changed
    CurrentIndexChanged(i32),
    /// A checkable object changed state
    Toggled(bool),
    /// A tree item was expanded
    Expanded(Vec<i32>),
    /// A tree item was collapsed
    Collapsed(Vec<i32>),
    /// A menu action fired; the signal source is the action
    Triggered { checked: Option<bool> },
    /// An item view selection changed
    SelectionChanged,
    /// Text of an editor changed
    TextChanged(String),
}

/// Subscription channels, one per signal kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalChannel {
    ValueChanged,
    CurrentIndexChanged,
    Toggled,
    Expanded,
    Collapsed,
    Triggered,
    SelectionChanged,
    TextChanged,
}

impl SignalKind {
    pub fn channel(&self) -> SignalChannel {
        match self {
            SignalKind::ValueChanged(_) => SignalChannel::ValueChanged,
            SignalKind::CurrentIndexChanged(_) => SignalChannel::CurrentIndexChanged,
            SignalKind::Toggled(_) => SignalChannel::Toggled,
            SignalKind::Expanded(_) => SignalChannel::Expanded,
            SignalKind::Collapsed(_) => SignalChannel::Collapsed,
            SignalKind::Triggered { .. } => SignalChannel::Triggered,
            SignalKind::SelectionChanged => SignalChannel::SelectionChanged,
            SignalKind::TextChanged(_) => SignalChannel::TextChanged,
        }
    }
}

/// A signal emitted by a live object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub source: ObjectId,
    pub kind: SignalKind,
}

impl Signal {
    pub fn new(source: ObjectId, kind: SignalKind) -> Self {
        Self { source, kind }
    }
}
