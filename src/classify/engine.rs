//! Classification Engine
//!
//! Drives the delayed-confirmation state machine, double-click coalescing and
//! text accumulation from three inputs:
//!
//! - [`ClassificationEngine::handle_event`] for raw input events
//! - [`ClassificationEngine::handle_signal`] for confirmation signals
//! - [`ClassificationEngine::tick`] for deadlines
//!
//! Each returns the script items that became final, in recording order.

use super::commands::Renderer;
use super::delayed::{self, DelayPhase, DelayState, DelayedContext, Resolution};
use super::filters::{classify_release, live_value, FilterInput, Outcome};
use super::text_input::{text_owner, TextInputState};
use super::ClassifierConfig;
use crate::capture::last_event::LastEvent;
use crate::capture::types::{EventKind, InputEvent, KeyCode, Signal, SignalChannel};
use crate::host::{ObjectId, WidgetClass};
use crate::script::action::ScriptItem;
use crate::time::Timestamp;
use crate::tracker::Scene;
use std::sync::Arc;
use tracing::{debug, trace};

/// A single-click result waiting to see whether a second click follows
#[derive(Debug, Clone)]
struct HeldClick {
    target: ObjectId,
    deadline: Timestamp,
    outcome: Outcome,
}

/// Second press seen; the next release on `target` is a double click
#[derive(Debug, Clone, Copy)]
struct PendingDouble {
    target: ObjectId,
    first_checked: Option<bool>,
}

/// Turns raw events into script items
pub struct ClassificationEngine {
    scene: Arc<dyn Scene + Send + Sync>,
    config: ClassifierConfig,
    render: Renderer,
    last_event: LastEvent,
    delay: DelayState,
    held: Option<HeldClick>,
    double: Option<PendingDouble>,
    text: Option<TextInputState>,
}

impl ClassificationEngine {
    pub fn new(
        scene: Arc<dyn Scene + Send + Sync>,
        config: ClassifierConfig,
        render: Renderer,
    ) -> Self {
        let last_event = LastEvent::new(config.duplicate_window(), config.tap_threshold());
        Self {
            scene,
            config,
            render,
            last_event,
            delay: DelayState::Idle,
            held: None,
            double: None,
            text: None,
        }
    }

    /// Phase of the delayed-confirmation state machine
    pub fn state(&self) -> DelayPhase {
        self.delay.phase()
    }

    /// Signal channels the pending interaction listens on
    pub fn subscriptions(&self) -> &'static [SignalChannel] {
        self.delay.channels()
    }

    /// Typed text not yet flushed
    pub fn pending_text(&self) -> Option<&str> {
        self.text.as_ref().map(|t| t.buffer.as_str())
    }

    pub fn has_held_click(&self) -> bool {
        self.held.is_some()
    }

    /// Classify one raw input event
    pub fn handle_event(&mut self, event: &InputEvent) -> Vec<ScriptItem> {
        let mut out = Vec::new();
        if !self.last_event.register(event) {
            trace!(kind = ?event.kind, object = %event.target, "Dropped duplicate event");
            return out;
        }
        if event.kind == EventKind::MouseMove {
            return out;
        }

        if self.text.as_ref().is_some_and(|t| t.target != event.target) {
            self.flush_text(&mut out);
        }

        match event.kind {
            EventKind::MousePress | EventKind::MouseDoubleClick => self.on_press(event, &mut out),
            EventKind::MouseRelease => self.on_release(event, &mut out),
            EventKind::KeyPress => self.on_key(event, &mut out),
            EventKind::FocusOut => {
                if self.text.as_ref().is_some_and(|t| t.target == event.target) {
                    self.flush_text(&mut out);
                }
            }
            EventKind::Close => self.on_close(event, &mut out),
            EventKind::KeyRelease | EventKind::Wheel => self.flush_held(&mut out),
            EventKind::MouseMove => {}
        }

        if !out.is_empty() {
            debug!(items = out.len(), kind = ?event.kind, "Classified event");
        }
        out
    }

    /// Feed a confirmation signal to the pending interaction
    pub fn handle_signal(&mut self, signal: &Signal) -> Vec<ScriptItem> {
        let mut out = Vec::new();
        self.delay = match std::mem::take(&mut self.delay) {
            DelayState::PressSeen(mut ctx) => {
                if !ctx.absorb(signal) {
                    DelayState::PressSeen(ctx)
                } else if ctx.entry.resolution == Resolution::OnSignal {
                    out.extend(ctx.resolve(self.scene.as_ref(), &self.render));
                    ctx.emitted = true;
                    DelayState::Confirmed(ctx)
                } else {
                    DelayState::Confirmed(ctx)
                }
            }
            DelayState::Confirmed(mut ctx) => {
                if !ctx.emitted {
                    ctx.absorb(signal);
                }
                DelayState::Confirmed(ctx)
            }
            DelayState::AwaitingSignal(mut ctx) => {
                if ctx.absorb(signal) {
                    out.extend(ctx.resolve(self.scene.as_ref(), &self.render));
                    DelayState::Idle
                } else {
                    DelayState::AwaitingSignal(ctx)
                }
            }
            DelayState::Idle => DelayState::Idle,
        };
        out
    }

    /// Fire deadlines that have passed by `now`
    pub fn tick(&mut self, now: Timestamp) -> Vec<ScriptItem> {
        let mut out = Vec::new();

        if self.held.as_ref().is_some_and(|h| now.is_after(h.deadline)) {
            self.flush_held(&mut out);
        }

        let expired = matches!(
            &self.delay,
            DelayState::AwaitingSignal(ctx) if ctx.deadline.is_some_and(|d| !d.is_after(now))
        );
        if expired {
            if let Some(ctx) = self.delay.take() {
                debug!(owner = %ctx.owner, "Delayed interaction timed out");
                out.extend(self.settle(ctx));
            }
        }

        if self
            .text
            .as_ref()
            .is_some_and(|t| t.is_idle(now, self.config.key_idle()))
        {
            self.flush_text(&mut out);
        }
        out
    }

    /// Finalize everything pending, e.g. when recording stops
    pub fn flush(&mut self) -> Vec<ScriptItem> {
        let mut out = Vec::new();
        self.flush_text(&mut out);
        self.flush_held(&mut out);
        if let Some(ctx) = self.delay.take() {
            out.extend(self.settle(ctx));
        }
        self.double = None;
        out
    }

    /// Forget all pending state without emitting
    pub fn reset(&mut self) {
        self.delay = DelayState::Idle;
        self.held = None;
        self.double = None;
        self.text = None;
        self.last_event.reset();
    }

    fn on_press(&mut self, event: &InputEvent, out: &mut Vec<ScriptItem>) {
        self.double = None;
        if let Some(held) = self.held.take() {
            if held.target == event.target && !event.timestamp.is_after(held.deadline) {
                trace!(object = %event.target, "Second press, discarding held click");
                self.double = Some(PendingDouble {
                    target: held.target,
                    first_checked: held.outcome.checked,
                });
            } else {
                out.extend(held.outcome.items);
            }
        }

        if let Some(ctx) = self.delay.take() {
            out.extend(self.settle(ctx));
        }

        let depth = self.config.ancestor_depth;
        if let Some((entry, owner)) = delayed::lookup(self.scene.as_ref(), event.target, depth) {
            trace!(owner = %owner, class = %entry.class, "Opened delayed context");
            let initial = live_value(self.scene.as_ref(), owner);
            self.double = None;
            self.delay = DelayState::PressSeen(DelayedContext::new(
                owner,
                entry,
                event.clone(),
                initial,
            ));
        }
    }

    fn on_release(&mut self, event: &InputEvent, out: &mut Vec<ScriptItem>) {
        let continuous = self.last_event.is_continuous(event);
        match std::mem::take(&mut self.delay) {
            DelayState::PressSeen(mut ctx) => {
                ctx.release = Some(event.clone());
                ctx.continuous = continuous;
                if ctx.is_confirmed() {
                    out.extend(ctx.resolve(self.scene.as_ref(), &self.render));
                } else {
                    ctx.deadline = Some(event.timestamp.saturating_add(self.config.delayed_timeout()));
                    self.delay = DelayState::AwaitingSignal(ctx);
                }
                return;
            }
            DelayState::Confirmed(mut ctx) => {
                ctx.release = Some(event.clone());
                ctx.continuous = continuous;
                if !ctx.emitted {
                    out.extend(ctx.resolve(self.scene.as_ref(), &self.render));
                }
                return;
            }
            DelayState::AwaitingSignal(ctx) => {
                // A release without a new press; the old context is done
                out.extend(self.settle(ctx));
            }
            DelayState::Idle => {}
        }
        self.classify_ordinary(event, continuous, out);
    }

    fn classify_ordinary(&mut self, event: &InputEvent, continuous: bool, out: &mut Vec<ScriptItem>) {
        let Some(path) = self.scene.path_of(event.target) else {
            trace!(object = %event.target, "Release on untracked object");
            self.double = None;
            return;
        };
        let double = self.double.take().filter(|d| d.target == event.target);
        let outcome = classify_release(&FilterInput {
            scene: self.scene.as_ref(),
            render: &self.render,
            release: event,
            target_path: &path,
            continuous,
            double: double.is_some(),
            first_checked: double.and_then(|d| d.first_checked),
            depth: self.config.ancestor_depth,
        });

        if double.is_none() && outcome.doubles {
            let pressed_at = self
                .last_event
                .last_press()
                .filter(|p| p.target == event.target)
                .map(|p| p.timestamp)
                .unwrap_or(event.timestamp);
            self.held = Some(HeldClick {
                target: event.target,
                deadline: pressed_at.saturating_add(self.config.double_click_interval()),
                outcome,
            });
        } else {
            out.extend(outcome.items);
        }
    }

    /// Render a context that will see no more input
    fn settle(&mut self, ctx: DelayedContext) -> Vec<ScriptItem> {
        if ctx.emitted {
            return Vec::new();
        }
        if ctx.is_confirmed() {
            return ctx.resolve(self.scene.as_ref(), &self.render);
        }
        if ctx.entry.falls_through {
            if let Some(release) = ctx.release.clone() {
                let mut out = Vec::new();
                let held = self.held.take();
                self.classify_ordinary(&release, ctx.continuous, &mut out);
                // Too late for a double click; emit whatever was held
                if let Some(h) = self.held.take() {
                    out.extend(h.outcome.items);
                }
                self.held = held;
                return out;
            }
        }
        vec![ctx.useless(self.scene.as_ref(), &self.render)]
    }

    fn on_key(&mut self, event: &InputEvent, out: &mut Vec<ScriptItem>) {
        self.flush_held(out);
        let Some(key) = event.key else {
            return;
        };
        let depth = self.config.ancestor_depth;

        let Some(owner) = text_owner(self.scene.as_ref(), event.target, depth) else {
            if let Some(path) = self.scene.path_of(event.target) {
                out.push(ScriptItem::Action(
                    self.render.key_event(&path, &key_name(event, key)),
                ));
            }
            return;
        };

        if event.modifiers.has_command_modifier() {
            self.flush_text(out);
            if let Some(path) = self.scene.path_of(owner) {
                out.push(ScriptItem::Action(
                    self.render.key_event(&path, &key_name(event, key)),
                ));
            }
            return;
        }

        if key.is_commit() {
            if self.text.is_some() {
                self.flush_text(out);
            } else if let Some(path) = self.scene.path_of(owner) {
                out.push(ScriptItem::Action(self.render.key_event(&path, &key.name())));
            }
            return;
        }

        let edit = key == KeyCode::Backspace || event.printable_text().is_some();
        if !edit {
            return;
        }
        if self.text.is_none() {
            let Some(path) = self.scene.path_of(owner) else {
                return;
            };
            self.text = Some(TextInputState::new(event.target, path, event.timestamp));
        }
        if let Some(text) = self.text.as_mut() {
            match event.printable_text() {
                Some(typed) if key != KeyCode::Backspace => text.push(typed, event.timestamp),
                _ => text.backspace(event.timestamp),
            }
        }
    }

    fn on_close(&mut self, event: &InputEvent, out: &mut Vec<ScriptItem>) {
        self.flush_text(out);
        self.flush_held(out);
        if let Some(ctx) = self.delay.take() {
            out.extend(self.settle(ctx));
        }
        let Some(path) = self.scene.path_of(event.target) else {
            return;
        };
        let line = match self.scene.class_of(event.target) {
            Some(WidgetClass::Dialog) => self.render.close_dialog(&path),
            Some(WidgetClass::Window) => self.render.close_window(&path),
            _ if self.scene.parent(event.target).is_none() => self.render.close_window(&path),
            _ => {
                out.push(ScriptItem::comment(format!("Closed {}", path)));
                return;
            }
        };
        out.push(ScriptItem::Action(line));
    }

    fn flush_held(&mut self, out: &mut Vec<ScriptItem>) {
        if let Some(held) = self.held.take() {
            out.extend(held.outcome.items);
        }
    }

    fn flush_text(&mut self, out: &mut Vec<ScriptItem>) {
        if let Some(text) = self.text.take() {
            out.push(text.finish(self.scene.as_ref(), &self.render));
        }
    }
}

/// Key name with modifier prefixes, e.g. `Ctrl+S`
fn key_name(event: &InputEvent, key: KeyCode) -> String {
    let base = match key {
        KeyCode::Character if !event.text.is_empty() => event.text.to_uppercase(),
        other => other.name(),
    };
    let m = event.modifiers;
    let mut name = String::new();
    if m.control {
        name.push_str("Ctrl+");
    }
    if m.alt {
        name.push_str("Alt+");
    }
    if m.meta {
        name.push_str("Meta+");
    }
    if m.shift && key != KeyCode::Character {
        name.push_str("Shift+");
    }
    if name.is_empty() && key == KeyCode::Character {
        return event.text.clone();
    }
    name.push_str(&base);
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::{Modifiers, MouseButton, SignalKind};
    use crate::gui::GuiLoop;
    use crate::host::{LiveObject, MemoryHost, MemoryObject, Point, Value};
    use crate::tracker::ObjectTracker;

    struct Fixture {
        _gui: GuiLoop,
        host: MemoryHost,
        engine: ClassificationEngine,
        window: Arc<MemoryObject>,
    }

    fn fixture() -> Fixture {
        fixture_with(Renderer::default())
    }

    fn fixture_with(render: Renderer) -> Fixture {
        let gui = GuiLoop::new();
        let tracker = ObjectTracker::new(gui.handle());
        let host = MemoryHost::new();
        host.attach(tracker.clone());
        let window = host.create_root("MainWindow", "main", Some(WidgetClass::Window));
        let engine = ClassificationEngine::new(tracker, ClassifierConfig::default(), render);
        Fixture {
            _gui: gui,
            host,
            engine,
            window,
        }
    }

    fn ms(t: u64) -> Timestamp {
        Timestamp::from_millis(t)
    }

    fn mouse(kind: EventKind, target: &Arc<MemoryObject>, pos: Point, t: u64) -> InputEvent {
        InputEvent::mouse(kind, target.id(), MouseButton::Left, pos, ms(t))
    }

    fn click(
        engine: &mut ClassificationEngine,
        target: &Arc<MemoryObject>,
        pos: Point,
        t: u64,
    ) -> Vec<ScriptItem> {
        let mut out = engine.handle_event(&mouse(EventKind::MousePress, target, pos, t));
        out.extend(engine.handle_event(&mouse(EventKind::MouseRelease, target, pos, t + 50)));
        out
    }

    fn lines(items: &[ScriptItem]) -> Vec<String> {
        items
            .iter()
            .map(|item| match item {
                ScriptItem::Action(line) => line.render(),
                ScriptItem::Comment(c) => format!("-- {}", c),
                other => format!("{:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_checkbox_click_generates_check_button() {
        let mut f = fixture();
        let check = f.host.create(&f.window, "CheckBox", "agree", Some(WidgetClass::CheckBox));
        let center = check.size().center();

        let out = click(&mut f.engine, &check, center, 1000);
        assert!(out.is_empty(), "held for a possible double click");
        assert!(f.engine.has_held_click());

        let out = f.engine.tick(ms(1500));
        assert_eq!(lines(&out), vec!["checkButton('n=main_0/n=agree_0', true);"]);
    }

    #[test]
    fn test_double_click_yields_one_result() {
        let mut f = fixture();
        let ok = f.host.create(&f.window, "PushButton", "ok", Some(WidgetClass::Button));
        let pos = Point::new(10, 10);

        let mut out = click(&mut f.engine, &ok, pos, 1000);
        out.extend(f.engine.handle_event(&mouse(EventKind::MouseDoubleClick, &ok, pos, 1150)));
        out.extend(f.engine.handle_event(&mouse(EventKind::MouseRelease, &ok, pos, 1200)));
        out.extend(f.engine.tick(ms(3000)));

        assert_eq!(lines(&out), vec!["buttonDblClick('n=main_0/n=ok_0');"]);
    }

    #[test]
    fn test_double_click_on_checkbox_renders_two_lines() {
        let mut f = fixture();
        let check = f.host.create(&f.window, "CheckBox", "agree", Some(WidgetClass::CheckBox));
        let pos = Point::new(10, 10);

        let mut out = click(&mut f.engine, &check, pos, 1000);
        out.extend(click(&mut f.engine, &check, pos, 1200));
        out.extend(f.engine.tick(ms(3000)));
        assert_eq!(
            lines(&out),
            vec![
                "checkButton('n=main_0/n=agree_0', true);",
                "checkButton('n=main_0/n=agree_0', false);",
            ]
        );
    }

    #[test]
    fn test_slow_second_click_is_two_single_clicks() {
        let mut f = fixture();
        let ok = f.host.create(&f.window, "PushButton", "ok", Some(WidgetClass::Button));
        let pos = Point::new(10, 10);

        let mut out = click(&mut f.engine, &ok, pos, 1000);
        out.extend(click(&mut f.engine, &ok, pos, 1600));
        out.extend(f.engine.flush());
        assert_eq!(
            lines(&out),
            vec![
                "buttonClick('n=main_0/n=ok_0');",
                "buttonClick('n=main_0/n=ok_0');"
            ]
        );
    }

    #[test]
    fn test_slider_drag_generates_single_set_value() {
        let mut f = fixture();
        let slider = f.host.create(&f.window, "Slider", "volume", Some(WidgetClass::Slider));
        slider.set_property("value", 0);

        let mut out = f.engine.handle_event(&mouse(EventKind::MousePress, &slider, Point::new(5, 5), 1000));
        assert_eq!(f.engine.state(), DelayPhase::PressSeen);
        assert_eq!(f.engine.subscriptions(), &[SignalChannel::ValueChanged]);
        for (i, v) in [10, 20, 35].into_iter().enumerate() {
            out.extend(f.engine.handle_event(&mouse(
                EventKind::MouseMove,
                &slider,
                Point::new(10 + i as i32 * 10, 5),
                1050 + i as u64 * 50,
            )));
            out.extend(
                f.engine
                    .handle_signal(&Signal::new(slider.id(), SignalKind::ValueChanged(Value::Int(v)))),
            );
        }
        assert!(out.is_empty());
        assert_eq!(f.engine.state(), DelayPhase::Confirmed);

        out.extend(f.engine.handle_event(&mouse(EventKind::MouseRelease, &slider, Point::new(40, 5), 1300)));
        assert_eq!(lines(&out), vec!["setValue('n=main_0/n=volume_0', 35);"]);
        assert_eq!(f.engine.state(), DelayPhase::Idle);
        assert!(f.engine.flush().is_empty());
    }

    #[test]
    fn test_unconfirmed_press_times_out_as_useless() {
        let mut f = fixture();
        let slider = f.host.create(&f.window, "Slider", "volume", Some(WidgetClass::Slider));

        let out = click(&mut f.engine, &slider, Point::new(3, 4), 1000);
        assert!(out.is_empty());
        assert_eq!(f.engine.state(), DelayPhase::AwaitingSignal);

        assert!(f.engine.tick(ms(1300)).is_empty());
        let out = f.engine.tick(ms(1600));
        assert_eq!(
            lines(&out),
            vec!["-- Useless or ambiguous interaction: mouseClick('n=main_0/n=volume_0', 'LeftButton', 3, 4);"]
        );
        assert_eq!(f.engine.state(), DelayPhase::Idle);
    }

    #[test]
    fn test_signal_after_release_confirms() {
        let mut f = fixture();
        let slider = f.host.create(&f.window, "Slider", "volume", Some(WidgetClass::Slider));

        click(&mut f.engine, &slider, Point::new(3, 4), 1000);
        let out = f
            .engine
            .handle_signal(&Signal::new(slider.id(), SignalKind::ValueChanged(Value::Int(7))));
        assert_eq!(lines(&out), vec!["setValue('n=main_0/n=volume_0', 7);"]);
    }

    #[test]
    fn test_spin_box_tap_changes_value() {
        let mut f = fixture();
        let spin = f.host.create(&f.window, "SpinBox", "count", Some(WidgetClass::SpinBox));
        spin.set_property("value", 4);
        let arrow = f.host.create(&spin, "SpinButton", "", None);

        let mut out = f.engine.handle_event(&mouse(EventKind::MousePress, &arrow, Point::new(1, 1), 1000));
        out.extend(f.engine.handle_signal(&Signal::new(spin.id(), SignalKind::ValueChanged(Value::Int(3)))));
        out.extend(f.engine.handle_event(&mouse(EventKind::MouseRelease, &arrow, Point::new(1, 1), 1040)));
        assert_eq!(lines(&out), vec!["changeValue('n=main_0/n=count_0', 'Down');"]);
    }

    #[test]
    fn test_spin_box_hold_sets_value() {
        let mut f = fixture();
        let spin = f.host.create(&f.window, "SpinBox", "count", Some(WidgetClass::SpinBox));
        spin.set_property("value", 4);

        let mut out = f.engine.handle_event(&mouse(EventKind::MousePress, &spin, Point::new(1, 1), 1000));
        for v in 5..=9 {
            out.extend(f.engine.handle_signal(&Signal::new(spin.id(), SignalKind::ValueChanged(Value::Int(v)))));
        }
        out.extend(f.engine.handle_event(&mouse(EventKind::MouseRelease, &spin, Point::new(1, 1), 1800)));
        assert_eq!(lines(&out), vec!["setValue('n=main_0/n=count_0', 9);"]);
    }

    #[test]
    fn test_tab_bar_resolves_on_signal_and_swallows_release() {
        let mut f = fixture();
        let tabs = f.host.create(&f.window, "TabBar", "tabs", Some(WidgetClass::TabBar));
        tabs.set_items(&["General", "Advanced"]);

        let press = mouse(EventKind::MousePress, &tabs, Point::new(5, 25), 1000);
        assert!(f.engine.handle_event(&press).is_empty());
        let out = f
            .engine
            .handle_signal(&Signal::new(tabs.id(), SignalKind::CurrentIndexChanged(1)));
        assert_eq!(
            lines(&out),
            vec!["selectTabItem('n=main_0/n=tabs_0', 1); -- Item text: 'Advanced'"]
        );
        let release = mouse(EventKind::MouseRelease, &tabs, Point::new(5, 25), 1050);
        assert!(f.engine.handle_event(&release).is_empty());
        assert!(f.engine.flush().is_empty());
    }

    #[test]
    fn test_menu_trigger_after_release() {
        let mut f = fixture();
        let menu = f.host.create(&f.window, "Menu", "fileMenu", Some(WidgetClass::Menu));
        let action = f.host.create(&menu, "Action", "actionSave", None);

        let mut out = click(&mut f.engine, &menu, Point::new(5, 45), 1000);
        out.extend(f.engine.handle_signal(&Signal::new(
            action.id(),
            SignalKind::Triggered { checked: None },
        )));
        assert_eq!(
            lines(&out),
            vec!["triggerAction('n=main_0/n=fileMenu_0/n=actionSave_0');"]
        );
    }

    #[test]
    fn test_tree_view_expansion_and_plain_click() {
        let mut f = fixture();
        let tree = f.host.create(&f.window, "TreeView", "tree", Some(WidgetClass::TreeView));
        tree.set_items(&["root", "other"]);

        let mut out = f.engine.handle_event(&mouse(EventKind::MousePress, &tree, Point::new(2, 5), 1000));
        out.extend(f.engine.handle_signal(&Signal::new(tree.id(), SignalKind::Expanded(vec![0]))));
        out.extend(f.engine.handle_event(&mouse(EventKind::MouseRelease, &tree, Point::new(2, 5), 1040)));
        assert_eq!(lines(&out), vec!["expandDelegate('n=main_0/n=tree_0', {0});"]);

        let out = click(&mut f.engine, &tree, Point::new(30, 25), 2000);
        assert!(out.is_empty());
        let out = f.engine.tick(ms(2600));
        assert_eq!(
            lines(&out),
            vec!["delegateClick('n=main_0/n=tree_0', {1}); -- Item text: 'other'"]
        );
    }

    #[test]
    fn test_typing_then_clicking_elsewhere_flushes_one_set_text() {
        let mut f = fixture();
        let field = f.host.create(&f.window, "LineEdit", "name", Some(WidgetClass::TextInput));
        let ok = f.host.create(&f.window, "PushButton", "ok", Some(WidgetClass::Button));

        let mut out = Vec::new();
        for (i, ch) in "abc".chars().enumerate() {
            let t = 1000 + i as u64 * 120;
            out.extend(f.engine.handle_event(&InputEvent::char_press(field.id(), ch, ms(t))));
            out.extend(f.engine.handle_event(&InputEvent {
                kind: EventKind::KeyRelease,
                ..InputEvent::char_press(field.id(), ch, ms(t + 30))
            }));
        }
        assert!(out.is_empty());
        assert_eq!(f.engine.pending_text(), Some("abc"));

        out.extend(click(&mut f.engine, &ok, Point::new(5, 5), 2000));
        out.extend(f.engine.flush());
        assert_eq!(
            lines(&out),
            vec![
                "setText('n=main_0/n=name_0', 'abc');",
                "buttonClick('n=main_0/n=ok_0');"
            ]
        );
    }

    #[test]
    fn test_live_text_wins_over_buffer() {
        let mut f = fixture();
        let field = f.host.create(&f.window, "LineEdit", "name", Some(WidgetClass::TextInput));
        field.set_property("text", "abd");

        f.engine.handle_event(&InputEvent::char_press(field.id(), 'x', ms(1000)));
        let out = f
            .engine
            .handle_event(&InputEvent::plain(EventKind::FocusOut, field.id(), ms(1100)));
        assert_eq!(lines(&out), vec!["setText('n=main_0/n=name_0', 'abd');"]);
    }

    #[test]
    fn test_backspace_and_enter() {
        let mut f = fixture();
        let field = f.host.create(&f.window, "LineEdit", "name", Some(WidgetClass::TextInput));
        let id = field.id();

        f.engine.handle_event(&InputEvent::char_press(id, 'a', ms(1000)));
        f.engine.handle_event(&InputEvent::char_press(id, 'x', ms(1100)));
        f.engine.handle_event(&InputEvent::key_press(id, KeyCode::Backspace, "\u{8}", ms(1200)));
        f.engine.handle_event(&InputEvent::char_press(id, 'b', ms(1300)));
        let out = f
            .engine
            .handle_event(&InputEvent::key_press(id, KeyCode::Return, "\r", ms(1400)));
        assert_eq!(lines(&out), vec!["setText('n=main_0/n=name_0', 'ab');"]);
    }

    #[test]
    fn test_idle_watchdog_flushes_text() {
        let mut f = fixture();
        let field = f.host.create(&f.window, "LineEdit", "name", Some(WidgetClass::TextInput));

        f.engine.handle_event(&InputEvent::char_press(field.id(), 'q', ms(1000)));
        assert!(f.engine.tick(ms(5999)).is_empty());
        let out = f.engine.tick(ms(6000));
        assert_eq!(lines(&out), vec!["setText('n=main_0/n=name_0', 'q');"]);
    }

    #[test]
    fn test_spin_box_editor_reports_owner_path() {
        let mut f = fixture();
        let spin = f.host.create(&f.window, "SpinBox", "count", Some(WidgetClass::SpinBox));
        let editor = f.host.create(&spin, "LineEdit", "", Some(WidgetClass::TextInput));

        f.engine.handle_event(&InputEvent::char_press(editor.id(), '4', ms(1000)));
        f.engine.handle_event(&InputEvent::char_press(editor.id(), '2', ms(1100)));
        let out = f.engine.flush();
        assert_eq!(lines(&out), vec!["setText('n=main_0/n=count_0', '42');"]);
    }

    #[test]
    fn test_non_text_key_on_other_object() {
        let mut f = fixture();
        let list = f.host.create(&f.window, "ListView", "files", Some(WidgetClass::ItemView));

        let out = f
            .engine
            .handle_event(&InputEvent::key_press(list.id(), KeyCode::Down, "", ms(1000)));
        assert_eq!(lines(&out), vec!["keyEvent('n=main_0/n=files_0', 'Down');"]);

        let save = InputEvent::char_press(list.id(), 's', ms(1200)).with_modifiers(Modifiers {
            control: true,
            ..Default::default()
        });
        let out = f.engine.handle_event(&save);
        assert_eq!(lines(&out), vec!["keyEvent('n=main_0/n=files_0', 'Ctrl+S');"]);
    }

    #[test]
    fn test_close_events() {
        let mut f = fixture();
        let dialog = f.host.create(&f.window, "Dialog", "prefs", Some(WidgetClass::Dialog));
        let frame = f.host.create(&f.window, "Frame", "panel", None);

        let out = f
            .engine
            .handle_event(&InputEvent::plain(EventKind::Close, dialog.id(), ms(1000)));
        assert_eq!(lines(&out), vec!["closeDialog('n=main_0/n=prefs_0');"]);

        let out = f
            .engine
            .handle_event(&InputEvent::plain(EventKind::Close, f.window.id(), ms(2000)));
        assert_eq!(lines(&out), vec!["closeWindow('n=main_0');"]);

        let out = f
            .engine
            .handle_event(&InputEvent::plain(EventKind::Close, frame.id(), ms(3000)));
        assert_eq!(lines(&out), vec!["-- Closed n=main_0/n=panel_0"]);
    }

    #[test]
    fn test_propagated_press_is_classified_once() {
        let mut f = fixture();
        let ok = f.host.create(&f.window, "PushButton", "ok", Some(WidgetClass::Button));
        let pos = Point::new(4, 4);

        f.engine.handle_event(&mouse(EventKind::MousePress, &ok, pos, 1000));
        // Same physical press delivered to the parent
        f.engine.handle_event(&mouse(EventKind::MousePress, &f.window, pos, 1000));
        f.engine.handle_event(&mouse(EventKind::MouseRelease, &ok, pos, 1050));
        f.engine.handle_event(&mouse(EventKind::MouseRelease, &f.window, pos, 1050));
        let out = f.engine.flush();
        assert_eq!(lines(&out), vec!["buttonClick('n=main_0/n=ok_0');"]);
    }

    #[test]
    fn test_duplicate_mouse_event_comment() {
        let mut f = fixture_with(Renderer::new(Default::default(), true));
        let ok = f.host.create(&f.window, "PushButton", "ok", Some(WidgetClass::Button));

        click(&mut f.engine, &ok, Point::new(4, 6), 1000);
        let out = f.engine.flush();
        assert_eq!(
            lines(&out),
            vec![
                "buttonClick('n=main_0/n=ok_0');",
                "-- mouseClick('n=main_0/n=ok_0', 'LeftButton', 4, 6);"
            ]
        );
    }

    #[test]
    fn test_press_on_other_object_finalizes_pending_context() {
        let mut f = fixture();
        let slider = f.host.create(&f.window, "Slider", "volume", Some(WidgetClass::Slider));
        let ok = f.host.create(&f.window, "PushButton", "ok", Some(WidgetClass::Button));

        let mut out = click(&mut f.engine, &slider, Point::new(1, 1), 1000);
        out.extend(click(&mut f.engine, &ok, Point::new(2, 2), 1100));
        out.extend(f.engine.flush());
        assert_eq!(
            lines(&out),
            vec![
                "-- Useless or ambiguous interaction: mouseClick('n=main_0/n=volume_0', 'LeftButton', 1, 1);",
                "buttonClick('n=main_0/n=ok_0');"
            ]
        );
    }
}
