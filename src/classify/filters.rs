//! Ordinary Filter Chain
//!
//! Filters tried top to bottom on a mouse release that no delayed context
//! claimed. Each filter looks for its class on the target and its ancestors;
//! the first one that produces an outcome wins, and a raw `mouseClick` is the
//! fallback.

use super::commands::{compress_selection, Renderer};
use crate::capture::types::{InputEvent, MouseButton};
use crate::host::{LiveObject, ObjectId, Point, Value, WidgetClass};
use crate::script::action::{ActionLine, ScriptItem};
use crate::tracker::{find_ancestor, Scene};
use std::sync::Arc;

/// What a filter sees
pub struct FilterInput<'a> {
    pub scene: &'a dyn Scene,
    pub render: &'a Renderer,
    pub release: &'a InputEvent,
    /// Path of the release target
    pub target_path: &'a str,
    pub continuous: bool,
    pub double: bool,
    /// Checked state predicted by the first click of a double click
    pub first_checked: Option<bool>,
    pub depth: usize,
}

impl FilterInput<'_> {
    fn find(&self, class: WidgetClass) -> Option<(ObjectId, usize)> {
        find_ancestor(self.scene, self.release.target, class, self.depth)
    }

    fn raw(&self) -> (&str, MouseButton, Point, bool) {
        (
            self.target_path,
            self.release.button,
            self.release.pos,
            self.double,
        )
    }

    fn unresolved(&self, reason: &str) -> Outcome {
        Outcome::fallback(vec![self.render.unresolved(
            reason,
            self.target_path,
            self.release.button,
            self.release.pos,
            self.double,
        )])
    }
}

/// Result of a filter
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub items: Vec<ScriptItem>,
    /// A filter recognized the interaction
    pub recognized: bool,
    /// A second click would change the meaning, so the result may be held
    pub doubles: bool,
    /// Checked state this click leaves behind, for checkable objects
    pub checked: Option<bool>,
}

impl Outcome {
    fn recognized(items: Vec<ScriptItem>, doubles: bool) -> Self {
        Self {
            items,
            recognized: true,
            doubles,
            checked: None,
        }
    }

    fn fallback(items: Vec<ScriptItem>) -> Self {
        Self {
            items,
            recognized: false,
            doubles: false,
            checked: None,
        }
    }
}

type FilterFn = fn(&FilterInput<'_>) -> Option<Outcome>;

/// One entry of the chain
pub struct Filter {
    pub name: &'static str,
    pub classes: &'static [WidgetClass],
    pub apply: FilterFn,
}

/// Ordinary chain, in priority order
pub const CHAIN: &[Filter] = &[
    Filter {
        name: "combo_box",
        classes: &[WidgetClass::ComboBox],
        apply: combo_box,
    },
    Filter {
        name: "item_view",
        classes: &[WidgetClass::ItemView],
        apply: item_view,
    },
    Filter {
        name: "tree_view",
        classes: &[WidgetClass::TreeView],
        apply: tree_view,
    },
    Filter {
        name: "checkable",
        classes: &[WidgetClass::CheckBox, WidgetClass::Button],
        apply: checkable,
    },
    Filter {
        name: "radio_button",
        classes: &[WidgetClass::RadioButton],
        apply: radio_button,
    },
    Filter {
        name: "button",
        classes: &[WidgetClass::Button],
        apply: button,
    },
    Filter {
        name: "menu_bar",
        classes: &[WidgetClass::MenuBar],
        apply: menu_bar,
    },
];

/// Run the chain; falls back to a raw click
pub fn classify_release(input: &FilterInput<'_>) -> Outcome {
    for filter in CHAIN {
        if let Some(outcome) = (filter.apply)(input) {
            tracing::trace!(filter = filter.name, "Release classified");
            return outcome;
        }
    }
    let line = input.render.mouse_click(
        input.target_path,
        input.release.button,
        input.release.pos,
        input.double,
    );
    // Drags are never the first half of a double click
    Outcome {
        items: vec![ScriptItem::Action(line)],
        recognized: false,
        doubles: !input.continuous,
        checked: None,
    }
}

fn live(input: &FilterInput<'_>, id: ObjectId) -> Option<Arc<dyn LiveObject>> {
    input.scene.object(id)
}

/// Clicks inside a combo box popup select an item; clicks on the box itself
/// only open the popup.
fn combo_box(input: &FilterInput<'_>) -> Option<Outcome> {
    let (combo, distance) = input.find(WidgetClass::ComboBox)?;
    let combo_path = input.scene.path_of(combo)?;
    if distance == 1 {
        return Some(input.unresolved("Combo box expanded"));
    }
    let popup = input.scene.class_of(input.release.target) == Some(WidgetClass::ItemView);
    if !popup {
        return Some(input.unresolved("Click inside combo box"));
    }
    let item = live(input, input.release.target).and_then(|o| o.item_at(input.release.pos));
    Some(match item {
        Some(item) => Outcome::recognized(
            input.render.recognized(
                vec![input.render.select_item(&combo_path, item.row(), &item.text)],
                input.raw(),
            ),
            false,
        ),
        None => input.unresolved("Click outside combo box items"),
    })
}

fn delegate(input: &FilterInput<'_>, view: ObjectId, tree: bool) -> Option<Outcome> {
    let path = input.scene.path_of(view)?;
    let object = live(input, view)?;
    let Some(item) = object.item_at(input.release.pos) else {
        return Some(input.unresolved("Click on empty area of item view"));
    };

    let modifiers = input.release.modifiers;
    if !tree && (modifiers.shift || modifiers.has_command_modifier()) {
        if let Some(line) = selection_line(input, &path, object.as_ref()) {
            return Some(Outcome::recognized(
                input.render.recognized(vec![line], input.raw()),
                false,
            ));
        }
    }

    let line = input.render.delegate_click(&path, &item, tree, input.double);
    Some(Outcome::recognized(
        input.render.recognized(vec![line], input.raw()),
        true,
    ))
}

/// Extended selections are recorded as the resulting cell set
fn selection_line(
    input: &FilterInput<'_>,
    path: &str,
    view: &dyn LiveObject,
) -> Option<ActionLine> {
    let selection = view.get("selection")?;
    let cells: Vec<(i32, i32)> = selection
        .as_list()?
        .iter()
        .filter_map(|cell| {
            let (r, c) = cell.as_str()?.split_once(':')?;
            Some((r.trim().parse().ok()?, c.trim().parse().ok()?))
        })
        .collect();
    let rows = view.get("count").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
    let columns = view.get("columnCount").and_then(|v| v.as_i64()).unwrap_or(1) as i32;
    Some(
        input
            .render
            .set_selection(path, &compress_selection(&cells, rows, columns)),
    )
}

fn item_view(input: &FilterInput<'_>) -> Option<Outcome> {
    let (view, _) = input.find(WidgetClass::ItemView)?;
    delegate(input, view, false)
}

fn tree_view(input: &FilterInput<'_>) -> Option<Outcome> {
    let (view, _) = input.find(WidgetClass::TreeView)?;
    delegate(input, view, true)
}

fn is_checkable(object: &dyn LiveObject) -> bool {
    object.get("checkable").and_then(|v| v.as_bool()).unwrap_or(false)
}

fn checkable(input: &FilterInput<'_>) -> Option<Outcome> {
    let owner = match input.find(WidgetClass::CheckBox) {
        Some((id, _)) => id,
        None => {
            let (id, _) = input.find(WidgetClass::Button)?;
            if !live(input, id).is_some_and(|o| is_checkable(o.as_ref())) {
                return None;
            }
            id
        }
    };
    let path = input.scene.path_of(owner)?;
    let current = live(input, owner)?
        .get("checked")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    // The toggle lands after the release is observed
    let first = input.first_checked.unwrap_or(!current);
    let mut lines = vec![input.render.check_button(&path, first)];
    if input.double {
        lines.push(input.render.check_button(&path, !first));
    }
    let mut outcome = Outcome::recognized(input.render.recognized(lines, input.raw()), true);
    outcome.checked = Some(first);
    Some(outcome)
}

fn radio_button(input: &FilterInput<'_>) -> Option<Outcome> {
    let (radio, _) = input.find(WidgetClass::RadioButton)?;
    let path = input.scene.path_of(radio)?;
    let mut lines = vec![input.render.check_button(&path, true)];
    if input.double {
        lines.push(input.render.check_button(&path, true));
    }
    let mut outcome = Outcome::recognized(input.render.recognized(lines, input.raw()), true);
    outcome.checked = Some(true);
    Some(outcome)
}

fn button(input: &FilterInput<'_>) -> Option<Outcome> {
    let (button, _) = input.find(WidgetClass::Button)?;
    let path = input.scene.path_of(button)?;
    let line = if input.double {
        input.render.button_dbl_click(&path)
    } else {
        let text = live(input, button)
            .and_then(|o| o.get("text"))
            .and_then(|v| v.as_str().map(str::to_string));
        input.render.button_click(&path, text.as_deref())
    };
    Some(Outcome::recognized(
        input.render.recognized(vec![line], input.raw()),
        true,
    ))
}

/// Opening a menu from the bar does nothing by itself; the triggered action
/// is recorded separately
fn menu_bar(input: &FilterInput<'_>) -> Option<Outcome> {
    input.find(WidgetClass::MenuBar)?;
    Some(input.unresolved("Menu opened"))
}

/// Live `value` property of an object, if it has one
pub fn live_value(scene: &dyn Scene, id: ObjectId) -> Option<Value> {
    scene.object(id).and_then(|o| o.get("value"))
}
