//! Delayed Classification
//!
//! Some widgets only reveal what a press did after the fact: a slider reports
//! its final value while being dragged, a tab bar switches on a signal, a menu
//! action fires on release. For these the press opens a [`DelayedContext`]
//! that collects confirmation signals until the interaction can be rendered.

use super::commands::Renderer;
use crate::capture::types::{InputEvent, Signal, SignalChannel, SignalKind};
use crate::host::{ObjectId, Value, WidgetClass};
use crate::script::action::{ActionLine, ScriptItem};
use crate::time::Timestamp;
use crate::tracker::{find_ancestor, Scene};
use tracing::{debug, warn};

/// When a delayed context produces its line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Signals only confirm; the line is rendered at release
    OnRelease,
    /// The first confirming signal renders the line
    OnSignal,
}

/// One row of the delayed table
#[derive(Debug, PartialEq, Eq)]
pub struct DelayedEntry {
    pub class: WidgetClass,
    pub resolution: Resolution,
    pub channels: &'static [SignalChannel],
    /// On timeout, classify the stored release with the ordinary chain
    /// instead of reporting a useless interaction
    pub falls_through: bool,
}

pub const DELAYED_TABLE: &[DelayedEntry] = &[
    DelayedEntry {
        class: WidgetClass::Slider,
        resolution: Resolution::OnRelease,
        channels: &[SignalChannel::ValueChanged],
        falls_through: false,
    },
    DelayedEntry {
        class: WidgetClass::SpinBox,
        resolution: Resolution::OnRelease,
        channels: &[SignalChannel::ValueChanged],
        falls_through: false,
    },
    DelayedEntry {
        class: WidgetClass::TabBar,
        resolution: Resolution::OnSignal,
        channels: &[SignalChannel::CurrentIndexChanged],
        falls_through: false,
    },
    DelayedEntry {
        class: WidgetClass::TreeView,
        resolution: Resolution::OnSignal,
        channels: &[SignalChannel::Expanded, SignalChannel::Collapsed],
        falls_through: true,
    },
    DelayedEntry {
        class: WidgetClass::Menu,
        resolution: Resolution::OnSignal,
        channels: &[SignalChannel::Triggered],
        falls_through: false,
    },
];

/// Nearest delayed class owning `target`
pub fn lookup(
    scene: &dyn Scene,
    target: ObjectId,
    depth: usize,
) -> Option<(&'static DelayedEntry, ObjectId)> {
    DELAYED_TABLE
        .iter()
        .filter_map(|entry| {
            find_ancestor(scene, target, entry.class, depth)
                .map(|(owner, distance)| (distance, entry, owner))
        })
        .min_by_key(|(distance, _, _)| *distance)
        .map(|(_, entry, owner)| (entry, owner))
}

/// Pending interaction waiting for confirmation
#[derive(Debug, Clone)]
pub struct DelayedContext {
    /// Object of the delayed class
    pub owner: ObjectId,
    pub entry: &'static DelayedEntry,
    /// Press that opened the context
    pub press: InputEvent,
    pub release: Option<InputEvent>,
    /// Owner's `value` at press time
    pub initial_value: Option<Value>,
    /// Latest reported value
    pub last_value: Option<Value>,
    pub changed_index: Option<i32>,
    /// `(expanded, rows)` of the last expansion change
    pub expansion: Option<(bool, Vec<i32>)>,
    /// Triggered action and its checked state
    pub trigger: Option<(ObjectId, Option<bool>)>,
    /// Press and release on the same object, held longer than a tap
    pub continuous: bool,
    pub deadline: Option<Timestamp>,
    /// Line already rendered; the release is swallowed
    pub emitted: bool,
}

impl DelayedContext {
    pub fn new(
        owner: ObjectId,
        entry: &'static DelayedEntry,
        press: InputEvent,
        initial_value: Option<Value>,
    ) -> Self {
        Self {
            owner,
            entry,
            press,
            release: None,
            initial_value,
            last_value: None,
            changed_index: None,
            expansion: None,
            trigger: None,
            continuous: false,
            deadline: None,
            emitted: false,
        }
    }

    pub fn channels(&self) -> &'static [SignalChannel] {
        self.entry.channels
    }

    /// Take in a signal. Returns false if it does not belong to this context.
    pub fn absorb(&mut self, signal: &Signal) -> bool {
        if !self.entry.channels.contains(&signal.kind.channel()) {
            return false;
        }
        // Menu actions are not children of the menu that shows them
        if self.entry.class != WidgetClass::Menu && signal.source != self.owner {
            return false;
        }
        match &signal.kind {
            SignalKind::ValueChanged(v) => self.last_value = Some(v.clone()),
            SignalKind::CurrentIndexChanged(i) => self.changed_index = Some(*i),
            SignalKind::Expanded(rows) => self.expansion = Some((true, rows.clone())),
            SignalKind::Collapsed(rows) => self.expansion = Some((false, rows.clone())),
            SignalKind::Triggered { checked } => self.trigger = Some((signal.source, *checked)),
            _ => return false,
        }
        true
    }

    /// Confirmation data has arrived
    pub fn is_confirmed(&self) -> bool {
        self.last_value.is_some()
            || self.changed_index.is_some()
            || self.expansion.is_some()
            || self.trigger.is_some()
    }

    /// Render the confirmed interaction
    pub fn resolve(&self, scene: &dyn Scene, render: &Renderer) -> Vec<ScriptItem> {
        let Some(path) = scene.path_of(self.owner) else {
            warn!(owner = %self.owner, "Delayed owner vanished before resolution");
            return Vec::new();
        };
        let event = self.release.as_ref().unwrap_or(&self.press);
        let raw = (path.as_str(), event.button, event.pos, false);

        let line = match self.entry.class {
            WidgetClass::Slider => self.last_value.as_ref().map(|v| render.set_value(&path, v)),
            WidgetClass::SpinBox => self.last_value.as_ref().map(|v| self.spin_line(&path, v, render)),
            WidgetClass::TabBar => self.changed_index.map(|index| {
                let text = scene
                    .object(self.owner)
                    .and_then(|o| o.item_at(self.press.pos))
                    .filter(|item| item.row() == index)
                    .map(|item| item.text)
                    .unwrap_or_default();
                render.select_tab_item(&path, index, &text)
            }),
            WidgetClass::TreeView => self
                .expansion
                .as_ref()
                .map(|(expand, rows)| render.expand_delegate(&path, rows, *expand)),
            WidgetClass::Menu => match self.trigger {
                Some((action, checked)) => match scene.path_of(action) {
                    Some(action_path) => Some(render.trigger_action(&action_path, checked)),
                    None => {
                        return vec![render.unresolved(
                            "Menu action is not tracked",
                            &path,
                            event.button,
                            event.pos,
                            false,
                        )]
                    }
                },
                None => None,
            },
            _ => None,
        };

        match line {
            Some(line) => render.recognized(vec![line], raw),
            None => vec![self.useless(scene, render)],
        }
    }

    /// Short taps step the spin box; holds and drags set the final value
    fn spin_line(&self, path: &str, value: &Value, render: &Renderer) -> ActionLine {
        if self.continuous {
            return render.set_value(path, value);
        }
        let before = self.initial_value.as_ref().and_then(Value::as_f64);
        match (before, value.as_f64()) {
            (Some(before), Some(after)) if after != before => render.change_value(path, after > before),
            _ => render.set_value(path, value),
        }
    }

    /// Comment reporting the press as having no observable effect
    pub fn useless(&self, scene: &dyn Scene, render: &Renderer) -> ScriptItem {
        let event = self.release.as_ref().unwrap_or(&self.press);
        let path = scene
            .path_of(event.target)
            .or_else(|| scene.path_of(self.owner))
            .unwrap_or_default();
        debug!(path = %path, class = %self.entry.class, "Delayed interaction not confirmed");
        render.useless(&path, event.button, event.pos)
    }
}

/// Delayed-classification state machine
#[derive(Debug, Clone, Default)]
pub enum DelayState {
    #[default]
    Idle,
    /// Press seen, waiting for signals or release
    PressSeen(DelayedContext),
    /// Signal seen before release
    Confirmed(DelayedContext),
    /// Release seen, waiting for a signal until the deadline
    AwaitingSignal(DelayedContext),
}

/// Payload-free view of [`DelayState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPhase {
    Idle,
    PressSeen,
    Confirmed,
    AwaitingSignal,
}

impl DelayState {
    pub fn phase(&self) -> DelayPhase {
        match self {
            DelayState::Idle => DelayPhase::Idle,
            DelayState::PressSeen(_) => DelayPhase::PressSeen,
            DelayState::Confirmed(_) => DelayPhase::Confirmed,
            DelayState::AwaitingSignal(_) => DelayPhase::AwaitingSignal,
        }
    }

    pub fn context(&self) -> Option<&DelayedContext> {
        match self {
            DelayState::Idle => None,
            DelayState::PressSeen(ctx)
            | DelayState::Confirmed(ctx)
            | DelayState::AwaitingSignal(ctx) => Some(ctx),
        }
    }

    /// Move the context out, leaving `Idle`
    pub fn take(&mut self) -> Option<DelayedContext> {
        match std::mem::take(self) {
            DelayState::Idle => None,
            DelayState::PressSeen(ctx)
            | DelayState::Confirmed(ctx)
            | DelayState::AwaitingSignal(ctx) => Some(ctx),
        }
    }

    /// Channels the pending context listens on
    pub fn channels(&self) -> &'static [SignalChannel] {
        self.context().map(DelayedContext::channels).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::{EventKind, MouseButton};
    use crate::host::Point;

    fn press(target: u64) -> InputEvent {
        InputEvent::mouse(
            EventKind::MousePress,
            ObjectId(target),
            MouseButton::Left,
            Point::new(5, 5),
            Timestamp::from_millis(0),
        )
    }

    fn entry(class: WidgetClass) -> &'static DelayedEntry {
        DELAYED_TABLE.iter().find(|e| e.class == class).unwrap()
    }

    #[test]
    fn test_table_covers_delayed_classes() {
        assert_eq!(entry(WidgetClass::Slider).resolution, Resolution::OnRelease);
        assert_eq!(entry(WidgetClass::SpinBox).resolution, Resolution::OnRelease);
        assert_eq!(entry(WidgetClass::TabBar).resolution, Resolution::OnSignal);
        assert_eq!(entry(WidgetClass::Menu).resolution, Resolution::OnSignal);
        assert!(entry(WidgetClass::TreeView).falls_through);
        assert!(!DELAYED_TABLE.iter().any(|e| e.class == WidgetClass::Button));
    }

    #[test]
    fn test_absorb_filters_by_channel_and_source() {
        let mut ctx = DelayedContext::new(ObjectId(1), entry(WidgetClass::Slider), press(1), None);
        assert!(!ctx.absorb(&Signal::new(ObjectId(1), SignalKind::Toggled(true))));
        assert!(!ctx.absorb(&Signal::new(
            ObjectId(2),
            SignalKind::ValueChanged(Value::Int(3))
        )));
        assert!(!ctx.is_confirmed());

        assert!(ctx.absorb(&Signal::new(ObjectId(1), SignalKind::ValueChanged(Value::Int(3)))));
        assert!(ctx.absorb(&Signal::new(ObjectId(1), SignalKind::ValueChanged(Value::Int(7)))));
        assert_eq!(ctx.last_value, Some(Value::Int(7)));
        assert!(ctx.is_confirmed());
    }

    #[test]
    fn test_menu_accepts_foreign_action_source() {
        let mut ctx = DelayedContext::new(ObjectId(1), entry(WidgetClass::Menu), press(1), None);
        assert!(ctx.absorb(&Signal::new(
            ObjectId(9),
            SignalKind::Triggered { checked: Some(true) }
        )));
        assert_eq!(ctx.trigger, Some((ObjectId(9), Some(true))));
    }

    #[test]
    fn test_state_take_resets_to_idle() {
        let ctx = DelayedContext::new(ObjectId(1), entry(WidgetClass::TabBar), press(1), None);
        let mut state = DelayState::PressSeen(ctx);
        assert_eq!(state.phase(), DelayPhase::PressSeen);
        assert_eq!(state.channels(), &[SignalChannel::CurrentIndexChanged]);
        assert!(state.take().is_some());
        assert_eq!(state.phase(), DelayPhase::Idle);
        assert!(state.channels().is_empty());
    }
}
