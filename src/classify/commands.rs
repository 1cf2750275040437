//! Action line rendering
//!
//! Every command the classifier can emit is built here, so the script
//! vocabulary and its argument conventions live in one place.

use crate::capture::types::MouseButton;
use crate::host::{CellIndex, ItemRef, Point, SelectionCell, Value};
use crate::script::action::{int_table, quote, ActionLine, ScriptItem};
use crate::script::TextIndexBehavior;

/// Renders classified interactions as script items
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    pub item_mode: TextIndexBehavior,
    /// Follow recognized lines with the raw click as a comment
    pub duplicate_mouse_event: bool,
}

impl Renderer {
    pub fn new(item_mode: TextIndexBehavior, duplicate_mouse_event: bool) -> Self {
        Self {
            item_mode,
            duplicate_mouse_event,
        }
    }

    /// Argument naming an item, plus an optional comment carrying its text
    pub fn item_arg(&self, index: i32, text: &str) -> (String, Option<String>) {
        match self.item_mode {
            TextIndexBehavior::Index if text.is_empty() => (index.to_string(), None),
            TextIndexBehavior::Index => (index.to_string(), Some(format!("Item text: {}", quote(text)))),
            TextIndexBehavior::Text => (quote(text), None),
            TextIndexBehavior::TextIndex => (quote(&format!("{}_{}", text, index)), None),
        }
    }

    fn with_optional_comment(line: ActionLine, comment: Option<String>) -> ActionLine {
        match comment {
            Some(c) => line.with_comment(c),
            None => line,
        }
    }

    pub fn button_click(&self, path: &str, text: Option<&str>) -> ActionLine {
        let line = ActionLine::call("buttonClick", &[quote(path)]);
        match text.filter(|t| !t.is_empty()) {
            Some(t) => line.with_comment(format!("Button text: {}", quote(t))),
            None => line,
        }
    }

    pub fn button_dbl_click(&self, path: &str) -> ActionLine {
        ActionLine::call("buttonDblClick", &[quote(path)])
    }

    pub fn check_button(&self, path: &str, checked: bool) -> ActionLine {
        ActionLine::call("checkButton", &[quote(path), checked.to_string()])
    }

    pub fn select_item(&self, path: &str, index: i32, text: &str) -> ActionLine {
        let (arg, comment) = self.item_arg(index, text);
        Self::with_optional_comment(ActionLine::call("selectItem", &[quote(path), arg]), comment)
    }

    pub fn select_tab_item(&self, path: &str, index: i32, text: &str) -> ActionLine {
        let (arg, comment) = self.item_arg(index, text);
        Self::with_optional_comment(
            ActionLine::call("selectTabItem", &[quote(path), arg]),
            comment,
        )
    }

    /// `setValue`; a two-element list becomes a range pair
    pub fn set_value(&self, path: &str, value: &Value) -> ActionLine {
        let mut args = vec![quote(path)];
        match value.as_list() {
            Some(pair) if pair.len() == 2 => {
                args.push(pair[0].to_script_literal());
                args.push(pair[1].to_script_literal());
            }
            _ => args.push(value.to_script_literal()),
        }
        ActionLine::call("setValue", &args)
    }

    pub fn change_value(&self, path: &str, up: bool) -> ActionLine {
        let direction = if up { "Up" } else { "Down" };
        ActionLine::call("changeValue", &[quote(path), quote(direction)])
    }

    pub fn set_text(&self, path: &str, text: &str) -> ActionLine {
        ActionLine::call("setText", &[quote(path), quote(text)])
    }

    /// Click on an item view or tree view item.
    ///
    /// Tree items are addressed by their row path. Flat items use the item
    /// mode; a non-zero column becomes `{row, column}`.
    pub fn delegate_click(&self, path: &str, item: &ItemRef, tree: bool, double: bool) -> ActionLine {
        let name = if double {
            "delegateDblClick"
        } else {
            "delegateClick"
        };
        let text_comment = (!item.text.is_empty()).then(|| format!("Item text: {}", quote(&item.text)));
        if tree {
            return Self::with_optional_comment(
                ActionLine::call(name, &[quote(path), int_table(&item.rows)]),
                text_comment,
            );
        }
        if item.column != 0 {
            return Self::with_optional_comment(
                ActionLine::call(name, &[quote(path), int_table(&[item.row(), item.column])]),
                text_comment,
            );
        }
        let (arg, comment) = self.item_arg(item.row(), &item.text);
        Self::with_optional_comment(ActionLine::call(name, &[quote(path), arg]), comment)
    }

    pub fn expand_delegate(&self, path: &str, rows: &[i32], expand: bool) -> ActionLine {
        let name = if expand {
            "expandDelegate"
        } else {
            "collapseDelegate"
        };
        ActionLine::call(name, &[quote(path), int_table(rows)])
    }

    pub fn trigger_action(&self, path: &str, checked: Option<bool>) -> ActionLine {
        match checked {
            Some(c) => ActionLine::call("triggerAction", &[quote(path), c.to_string()]),
            None => ActionLine::call("triggerAction", &[quote(path)]),
        }
    }

    /// `setSelection` with cells, or `clearSelection` when empty
    pub fn set_selection(&self, path: &str, cells: &[SelectionCell]) -> ActionLine {
        if cells.is_empty() {
            return ActionLine::call("clearSelection", &[quote(path)]);
        }
        let cells: Vec<String> = cells
            .iter()
            .map(|c| format!("{{{}, {}}}", c.row, c.column))
            .collect();
        ActionLine::call(
            "setSelection",
            &[quote(path), format!("{{{}}}", cells.join(", "))],
        )
    }

    pub fn key_event(&self, path: &str, key: &str) -> ActionLine {
        ActionLine::call("keyEvent", &[quote(path), quote(key)])
    }

    pub fn close_dialog(&self, path: &str) -> ActionLine {
        ActionLine::call("closeDialog", &[quote(path)])
    }

    pub fn close_window(&self, path: &str) -> ActionLine {
        ActionLine::call("closeWindow", &[quote(path)])
    }

    pub fn mouse_click(&self, path: &str, button: MouseButton, pos: Point, double: bool) -> ActionLine {
        let name = if double { "mouseDblClick" } else { "mouseClick" };
        ActionLine::call(
            name,
            &[
                quote(path),
                quote(button.as_script_str()),
                pos.x.to_string(),
                pos.y.to_string(),
            ],
        )
    }

    /// Comment for an interaction with no observable effect
    pub fn useless(&self, path: &str, button: MouseButton, pos: Point) -> ScriptItem {
        ScriptItem::comment(format!(
            "Useless or ambiguous interaction: {}",
            self.mouse_click(path, button, pos, false).command
        ))
    }

    /// Comment for an interaction whose target could not be determined
    pub fn unresolved(
        &self,
        reason: &str,
        path: &str,
        button: MouseButton,
        pos: Point,
        double: bool,
    ) -> ScriptItem {
        ScriptItem::comment(format!(
            "{}: {}",
            reason,
            self.mouse_click(path, button, pos, double).command
        ))
    }

    /// Items for recognized lines, plus the raw click when configured
    pub fn recognized(
        &self,
        lines: Vec<ActionLine>,
        raw: (&str, MouseButton, Point, bool),
    ) -> Vec<ScriptItem> {
        let already_raw = lines
            .iter()
            .all(|l| matches!(l.function(), "mouseClick" | "mouseDblClick"));
        let mut items: Vec<ScriptItem> = lines.into_iter().map(ScriptItem::Action).collect();
        if self.duplicate_mouse_event && !already_raw && !items.is_empty() {
            let (path, button, pos, double) = raw;
            items.push(ScriptItem::comment(
                self.mouse_click(path, button, pos, double).command,
            ));
        }
        items
    }
}

/// Compress a cell list: complete rows become `{row, 'ALL'}` and complete
/// columns `{'ALL', column}`.
pub fn compress_selection(cells: &[(i32, i32)], rows: i32, columns: i32) -> Vec<SelectionCell> {
    use std::collections::BTreeSet;

    let set: BTreeSet<(i32, i32)> = cells.iter().copied().collect();
    let mut out = Vec::new();
    let mut covered = BTreeSet::new();

    if rows > 0 && columns > 0 {
        for c in 0..columns {
            if (0..rows).all(|r| set.contains(&(r, c))) {
                out.push(SelectionCell {
                    row: CellIndex::All,
                    column: CellIndex::At(c),
                });
                covered.extend((0..rows).map(|r| (r, c)));
            }
        }
        for r in 0..rows {
            let full = (0..columns).all(|c| set.contains(&(r, c)));
            let new = (0..columns).any(|c| !covered.contains(&(r, c)));
            if full && new {
                out.push(SelectionCell {
                    row: CellIndex::At(r),
                    column: CellIndex::All,
                });
                covered.extend((0..columns).map(|c| (r, c)));
            }
        }
    }

    for &(r, c) in &set {
        if !covered.contains(&(r, c)) {
            out.push(SelectionCell {
                row: CellIndex::At(r),
                column: CellIndex::At(c),
            });
        }
    }
    out
}
