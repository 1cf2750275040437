//! Text input accumulation
//!
//! Keystrokes into an editor are collected silently and written as a single
//! `setText` once the user is done with the field.

use super::commands::Renderer;
use crate::host::{ObjectId, WidgetClass};
use crate::script::action::ScriptItem;
use crate::time::Timestamp;
use crate::tracker::{find_ancestor, Scene};
use std::time::Duration;

/// Classes whose embedded editor reports through the owner
const EDITOR_OWNERS: &[WidgetClass] = &[WidgetClass::SpinBox, WidgetClass::ComboBox];

/// Object whose path a text edit on `target` is recorded against.
///
/// `None` if `target` is not a text input.
pub fn text_owner(scene: &dyn Scene, target: ObjectId, depth: usize) -> Option<ObjectId> {
    if scene.class_of(target) != Some(WidgetClass::TextInput) {
        return None;
    }
    let owner = EDITOR_OWNERS
        .iter()
        .filter_map(|class| find_ancestor(scene, target, *class, depth))
        .min_by_key(|(_, distance)| *distance)
        .map(|(owner, _)| owner);
    Some(owner.unwrap_or(target))
}

/// Text typed into one editor since it was last flushed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInputState {
    /// Editor receiving the keys
    pub target: ObjectId,
    /// Path the edit is recorded against
    pub path: String,
    pub buffer: String,
    pub last_key: Timestamp,
}

impl TextInputState {
    pub fn new(target: ObjectId, path: String, now: Timestamp) -> Self {
        Self {
            target,
            path,
            buffer: String::new(),
            last_key: now,
        }
    }

    pub fn push(&mut self, text: &str, now: Timestamp) {
        self.buffer.push_str(text);
        self.last_key = now;
    }

    pub fn backspace(&mut self, now: Timestamp) {
        self.buffer.pop();
        self.last_key = now;
    }

    /// No keystroke for at least `idle`
    pub fn is_idle(&self, now: Timestamp, idle: Duration) -> bool {
        now.duration_since(self.last_key) >= idle
    }

    /// `setText` with the editor's live text, or the typed text if the
    /// editor cannot be read
    pub fn finish(self, scene: &dyn Scene, render: &Renderer) -> ScriptItem {
        let text = scene
            .object(self.target)
            .and_then(|o| o.get("text"))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or(self.buffer);
        ScriptItem::Action(render.set_text(&self.path, &text))
    }
}
