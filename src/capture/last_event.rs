//! Duplicate Event Detection
//!
//! Hosts deliver one physical event to the target and then to each ancestor
//! that does not accept it. Only the first delivery is classified.

use super::types::{EventKind, InputEvent, MouseButton};
use crate::host::{ObjectId, Point};
use crate::time::Timestamp;
use std::time::Duration;

/// Fingerprint of an already classified event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenEvent {
    pub kind: EventKind,
    pub target: ObjectId,
    pub button: MouseButton,
    pub pos: Point,
    pub timestamp: Timestamp,
}

impl SeenEvent {
    fn from_event(event: &InputEvent) -> Self {
        Self {
            kind: event.kind,
            target: event.target,
            button: event.button,
            pos: event.pos,
            timestamp: event.timestamp,
        }
    }
}

/// Remembers the last press, release and key event
#[derive(Debug, Clone)]
pub struct LastEvent {
    window: Duration,
    tap_threshold: Duration,
    press: Option<SeenEvent>,
    release: Option<SeenEvent>,
    key: Option<SeenEvent>,
}

impl LastEvent {
    pub fn new(window: Duration, tap_threshold: Duration) -> Self {
        Self {
            window,
            tap_threshold,
            press: None,
            release: None,
            key: None,
        }
    }

    /// Record an event. Returns false if it is a propagated or redelivered copy
    /// of the previous event of the same kind.
    pub fn register(&mut self, event: &InputEvent) -> bool {
        let slot = match event.kind {
            EventKind::MousePress | EventKind::MouseDoubleClick => &mut self.press,
            EventKind::MouseRelease => &mut self.release,
            EventKind::KeyPress | EventKind::KeyRelease => &mut self.key,
            _ => return true,
        };
        let seen = SeenEvent::from_event(event);
        if let Some(prev) = slot {
            let propagated = prev.kind == seen.kind
                && prev.button == seen.button
                && prev.timestamp == seen.timestamp
                && prev.target != seen.target;
            let redelivered = prev.kind == seen.kind
                && prev.target == seen.target
                && prev.button == seen.button
                && prev.pos == seen.pos
                && seen.timestamp.duration_since(prev.timestamp) < self.window
                && !event.kind.is_keyboard();
            if propagated || redelivered {
                return false;
            }
        }
        *slot = Some(seen);
        true
    }

    pub fn last_press(&self) -> Option<&SeenEvent> {
        self.press.as_ref()
    }

    pub fn last_release(&self) -> Option<&SeenEvent> {
        self.release.as_ref()
    }

    /// A release continues its press when both hit the same object and the
    /// button was held longer than a tap.
    pub fn is_continuous(&self, release: &InputEvent) -> bool {
        self.press.is_some_and(|press| {
            press.target == release.target
                && release.timestamp.duration_since(press.timestamp) > self.tap_threshold
        })
    }

    /// Forget everything, e.g. when a recording restarts
    pub fn reset(&mut self) {
        self.press = None;
        self.release = None;
        self.key = None;
    }
}
