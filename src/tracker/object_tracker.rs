//! Object Tracker
//!
//! Keeps the arena in sync with the host from lifecycle notifications alone.
//!
//! Notifications can arrive on any thread and in awkward orders: a child
//! before its parent, a reparent while creations are still queued, a
//! destruction of an object that was never registered. The tracker settles
//! them under one recursive mutex:
//!
//! - on the home thread, outside a hook, work is applied immediately
//! - off the home thread or inside a hook, it is queued and drained by a
//!   zero-delay timer on the home thread
//! - reparents whose timing is ambiguous always go through the queue, so each
//!   loop turn sees one consistent pass
//!
//! Objects whose ancestry reaches the engine's own namespace are never
//! tracked.

use super::arena::{ObjectArena, ObjectNode};
use super::identity::{object_path, resolve_path};
use super::Scene;
use crate::gui::GuiHandle;
use crate::host::{LifecycleSink, LiveObject, ObjectId, WidgetClass};
use parking_lot::{ReentrantMutex, RwLock};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Ancestry steps walked before an object is considered malformed
pub const LOOP_DETECTION_COUNT: usize = 100;

/// Type-name prefix of objects created by the engine itself
pub const INTERNAL_NAMESPACE: &str = "WidgetReplay::";

/// Kind of a queued lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleKind {
    Create,
    Destroy,
}

/// A lifecycle notification waiting for the home thread
#[derive(Clone)]
pub struct PendingLifecycle {
    pub id: ObjectId,
    pub kind: LifecycleKind,
    handle: Option<Weak<dyn LiveObject>>,
}

impl std::fmt::Debug for PendingLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLifecycle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Change reported to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// An object became known
    Created { id: ObjectId, path: String },
    /// An object stopped being known
    Destroyed { id: ObjectId },
    /// A known object's path changed (reparent or rename)
    Reparented { id: ObjectId, path: String },
}

impl TrackerEvent {
    pub fn id(&self) -> ObjectId {
        match self {
            TrackerEvent::Created { id, .. }
            | TrackerEvent::Destroyed { id }
            | TrackerEvent::Reparented { id, .. } => *id,
        }
    }
}

/// Receiver of [`TrackerEvent`]s.
///
/// Called after the tracker state is updated, without the state borrowed, so
/// observers may query the tracker.
pub trait TrackerObserver: Send + Sync {
    fn on_tracker_event(&self, event: &TrackerEvent);
}

/// Counters for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub created: u64,
    pub destroyed: u64,
    pub reparented: u64,
    pub filtered: u64,
    pub queued: u64,
    pub flushes: u64,
}

struct QueuedReparent {
    id: ObjectId,
    handle: Weak<dyn LiveObject>,
}

#[derive(Default)]
struct TrackerState {
    arena: ObjectArena,
    pending: Vec<PendingLifecycle>,
    reparents: Vec<QueuedReparent>,
    flush_scheduled: bool,
    hook_depth: usize,
    filtered: HashSet<ObjectId>,
    stats: TrackerStats,
}

/// Mirror of the host object graph
pub struct ObjectTracker {
    gui: GuiHandle,
    namespace: String,
    state: ReentrantMutex<RefCell<TrackerState>>,
    observers: RwLock<Vec<Arc<dyn TrackerObserver>>>,
    this: Weak<ObjectTracker>,
}

/// Marks a hook reentrancy window; notifications arriving on the home thread
/// while a guard is alive are queued.
pub struct HookGuard<'a> {
    tracker: &'a ObjectTracker,
}

impl Drop for HookGuard<'_> {
    fn drop(&mut self) {
        self.tracker.leave_hook();
    }
}

impl ObjectTracker {
    /// Create a tracker whose home thread is the GUI thread behind `gui`.
    pub fn new(gui: GuiHandle) -> Arc<Self> {
        Self::with_namespace(gui, INTERNAL_NAMESPACE)
    }

    /// Create a tracker that filters a custom internal namespace
    pub fn with_namespace(gui: GuiHandle, namespace: &str) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            gui,
            namespace: namespace.to_string(),
            state: ReentrantMutex::new(RefCell::new(TrackerState::default())),
            observers: RwLock::new(Vec::new()),
            this: this.clone(),
        })
    }

    pub fn subscribe(&self, observer: Arc<dyn TrackerObserver>) {
        self.observers.write().push(observer);
    }

    /// Open a hook reentrancy window
    pub fn enter_hook(&self) -> HookGuard<'_> {
        let guard = self.state.lock();
        guard.borrow_mut().hook_depth += 1;
        HookGuard { tracker: self }
    }

    fn leave_hook(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.hook_depth = state.hook_depth.saturating_sub(1);
        if state.hook_depth == 0 && (!state.pending.is_empty() || !state.reparents.is_empty()) {
            self.schedule_flush(&mut state);
        }
    }

    /// Register an object, parents first. Idempotent.
    ///
    /// Returns false if the object belongs to the internal namespace.
    pub fn add_object(&self, object: &Arc<dyn LiveObject>) -> bool {
        let mut events = Vec::new();
        let added = {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            self.add_locked(&mut state, object, &mut events)
        };
        self.notify(events);
        added
    }

    /// Forget an object and its known descendants. Idempotent.
    pub fn remove_object(&self, id: ObjectId) {
        let mut events = Vec::new();
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            Self::remove_locked(&mut state, id, &mut events);
        }
        self.notify(events);
    }

    /// Register an existing subtree, e.g. when attaching to a running
    /// application.
    pub fn discover(&self, root: &Arc<dyn LiveObject>) -> usize {
        let mut events = Vec::new();
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            let mut stack = vec![root.clone()];
            while let Some(object) = stack.pop() {
                if self.add_locked(&mut state, &object, &mut events) {
                    let mut children = object.children();
                    children.reverse();
                    stack.extend(children);
                }
            }
        }
        let count = events.len();
        self.notify(events);
        count
    }

    /// Drain queued lifecycle notifications and reparents in one pass.
    pub fn flush(&self) {
        debug_assert!(self.gui.is_home_thread(), "tracker flushed off its home thread");
        let mut events = Vec::new();
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            state.flush_scheduled = false;
            state.stats.flushes += 1;

            let pending = std::mem::take(&mut state.pending);
            for entry in pending {
                match entry.kind {
                    LifecycleKind::Create => {
                        if let Some(object) = entry.handle.as_ref().and_then(Weak::upgrade) {
                            self.add_locked(&mut state, &object, &mut events);
                        }
                    }
                    LifecycleKind::Destroy => Self::remove_locked(&mut state, entry.id, &mut events),
                }
            }

            let mut queued = std::mem::take(&mut state.reparents);
            // Last notification per object wins
            let mut seen = HashSet::new();
            queued.reverse();
            queued.retain(|r| seen.insert(r.id));
            queued.reverse();

            for entry in queued {
                let Some(object) = entry.handle.upgrade() else {
                    continue;
                };
                if !state.arena.contains(entry.id) {
                    self.add_locked(&mut state, &object, &mut events);
                    continue;
                }
                self.settle_reparent(&mut state, &object, &mut events);
            }
        }
        trace!(events = events.len(), "Tracker queue flushed");
        self.notify(events);
    }

    pub fn is_known(&self, id: ObjectId) -> bool {
        let guard = self.state.lock();
        let known = guard.borrow().arena.contains(id);
        known
    }

    pub fn known_count(&self) -> usize {
        let guard = self.state.lock();
        let count = guard.borrow().arena.len();
        count
    }

    /// Queued lifecycle notifications plus queued reparents
    pub fn pending_count(&self) -> usize {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.pending.len() + state.reparents.len()
    }

    pub fn stats(&self) -> TrackerStats {
        let guard = self.state.lock();
        let stats = guard.borrow().stats.clone();
        stats
    }

    /// Look up a known object by path
    pub fn find_by_path(&self, path: &str) -> Option<ObjectId> {
        let guard = self.state.lock();
        let found = resolve_path(&guard.borrow().arena, path);
        found
    }

    /// Every known object with its current path
    pub fn known_paths(&self) -> Vec<(ObjectId, String)> {
        let guard = self.state.lock();
        let state = guard.borrow();
        let mut paths: Vec<(ObjectId, String)> = state
            .arena
            .ids()
            .filter_map(|id| object_path(&state.arena, id).map(|p| (id, p)))
            .collect();
        paths.sort_by(|a, b| a.1.cmp(&b.1));
        paths
    }

    /// Run `f` with read access to the arena
    pub fn with_arena<R>(&self, f: impl FnOnce(&ObjectArena) -> R) -> R {
        let guard = self.state.lock();
        let state = guard.borrow();
        f(&state.arena)
    }

    fn must_queue(&self, state: &TrackerState) -> bool {
        !self.gui.is_home_thread() || state.hook_depth > 0
    }

    /// Walk the ancestry looking for the internal namespace
    fn is_internal(&self, object: &Arc<dyn LiveObject>) -> bool {
        let mut current = Some(object.clone());
        let mut steps = 0;
        while let Some(o) = current {
            if o.type_name().starts_with(&self.namespace) {
                return true;
            }
            steps += 1;
            if steps > LOOP_DETECTION_COUNT {
                warn!(id = %object.id(), "Ancestry walk exceeded loop limit, ignoring object");
                return true;
            }
            current = o.parent();
        }
        false
    }

    fn add_locked(
        &self,
        state: &mut TrackerState,
        object: &Arc<dyn LiveObject>,
        events: &mut Vec<TrackerEvent>,
    ) -> bool {
        let id = object.id();
        if state.arena.contains(id) {
            return true;
        }
        if state.filtered.contains(&id) {
            return false;
        }
        if self.is_internal(object) {
            state.filtered.insert(id);
            state.stats.filtered += 1;
            trace!(id = %id, "Filtered internal object");
            return false;
        }

        let parent_id = match object.parent() {
            Some(parent) => {
                if !self.add_locked(state, &parent, events) {
                    state.filtered.insert(id);
                    state.stats.filtered += 1;
                    return false;
                }
                Some(parent.id())
            }
            None => None,
        };

        state
            .pending
            .retain(|p| !(p.id == id && p.kind == LifecycleKind::Create));

        let inserted = state.arena.insert(ObjectNode::from_live(object), parent_id);
        debug_assert!(inserted, "object {} registered before its parent or twice", id);
        if !inserted {
            error!(id = %id, "Tracker invariant violated: parent unknown or double registration");
            return false;
        }
        state.stats.created += 1;
        if let Some(path) = object_path(&state.arena, id) {
            events.push(TrackerEvent::Created { id, path });
        }
        true
    }

    fn remove_locked(state: &mut TrackerState, id: ObjectId, events: &mut Vec<TrackerEvent>) {
        state
            .pending
            .retain(|p| !(p.id == id && p.kind == LifecycleKind::Create));
        state.reparents.retain(|r| r.id != id);
        state.filtered.remove(&id);
        for removed in state.arena.remove(id) {
            state.stats.destroyed += 1;
            events.push(TrackerEvent::Destroyed { id: removed });
        }
    }

    /// Move a known object to its live parent and report new paths
    fn settle_reparent(
        &self,
        state: &mut TrackerState,
        object: &Arc<dyn LiveObject>,
        events: &mut Vec<TrackerEvent>,
    ) {
        let id = object.id();
        let new_parent = match object.parent() {
            Some(parent) => {
                if !self.add_locked(state, &parent, events) {
                    // Moved under an internal object
                    Self::remove_locked(state, id, events);
                    return;
                }
                Some(parent.id())
            }
            None => None,
        };

        let renamed = state.arena.rename(id, &object.object_name());
        let moved = state.arena.get(id).map(|n| n.parent) != Some(new_parent);
        if moved && !state.arena.reparent(id, new_parent) {
            warn!(id = %id, "Reparent would create a cycle, keeping old parent");
            return;
        }
        if moved || renamed {
            state.stats.reparented += 1;
            Self::report_subtree(state, id, events);
        }
    }

    fn report_subtree(state: &TrackerState, id: ObjectId, events: &mut Vec<TrackerEvent>) {
        let mut ids = vec![id];
        ids.extend(state.arena.descendants(id));
        for changed in ids {
            if let Some(path) = object_path(&state.arena, changed) {
                events.push(TrackerEvent::Reparented { id: changed, path });
            }
        }
    }

    fn enqueue(&self, state: &mut TrackerState, entry: PendingLifecycle) {
        match entry.kind {
            LifecycleKind::Create => {
                let duplicate = state
                    .pending
                    .iter()
                    .any(|p| p.id == entry.id && p.kind == LifecycleKind::Create);
                if duplicate {
                    return;
                }
            }
            LifecycleKind::Destroy => {
                let before = state.pending.len();
                state
                    .pending
                    .retain(|p| !(p.id == entry.id && p.kind == LifecycleKind::Create));
                let cancelled = before != state.pending.len();
                if cancelled && !state.arena.contains(entry.id) {
                    // Created and destroyed before the queue drained
                    return;
                }
            }
        }
        state.stats.queued += 1;
        state.pending.push(entry);
        self.schedule_flush(state);
    }

    fn schedule_flush(&self, state: &mut TrackerState) {
        if state.flush_scheduled {
            return;
        }
        state.flush_scheduled = true;
        let this = self.this.clone();
        let started = self.gui.start_timer(Duration::ZERO, move || {
            if let Some(tracker) = this.upgrade() {
                tracker.flush();
            }
        });
        if let Err(e) = started {
            state.flush_scheduled = false;
            warn!("Failed to schedule tracker flush: {}", e);
        }
    }

    fn notify(&self, events: Vec<TrackerEvent>) {
        if events.is_empty() {
            return;
        }
        let observers = self.observers.read().clone();
        if observers.is_empty() {
            return;
        }
        let _hook = self.enter_hook();
        for event in &events {
            debug!(?event, "Tracker event");
            for observer in &observers {
                observer.on_tracker_event(event);
            }
        }
    }
}

impl LifecycleSink for ObjectTracker {
    fn object_created(&self, object: &Arc<dyn LiveObject>) {
        let mut events = Vec::new();
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            if self.must_queue(&state) {
                let entry = PendingLifecycle {
                    id: object.id(),
                    kind: LifecycleKind::Create,
                    handle: Some(Arc::downgrade(object)),
                };
                self.enqueue(&mut state, entry);
            } else {
                self.add_locked(&mut state, object, &mut events);
            }
        }
        self.notify(events);
    }

    fn object_destroyed(&self, id: ObjectId) {
        let mut events = Vec::new();
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            if self.must_queue(&state) {
                let entry = PendingLifecycle {
                    id,
                    kind: LifecycleKind::Destroy,
                    handle: None,
                };
                self.enqueue(&mut state, entry);
            } else {
                Self::remove_locked(&mut state, id, &mut events);
            }
        }
        self.notify(events);
    }

    fn object_reparented(&self, object: &Arc<dyn LiveObject>) {
        let mut events = Vec::new();
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            let id = object.id();
            let ambiguous = self.must_queue(&state) || !state.pending.is_empty();

            if ambiguous {
                state.reparents.push(QueuedReparent {
                    id,
                    handle: Arc::downgrade(object),
                });
                self.schedule_flush(&mut state);
            } else if !state.arena.contains(id) {
                self.add_locked(&mut state, object, &mut events);
            } else {
                match object.parent() {
                    Some(parent) if !state.arena.contains(parent.id()) => {
                        // Parent first, the move itself waits for the next pass
                        if self.add_locked(&mut state, &parent, &mut events) {
                            state.reparents.push(QueuedReparent {
                                id,
                                handle: Arc::downgrade(object),
                            });
                            self.schedule_flush(&mut state);
                        } else {
                            Self::remove_locked(&mut state, id, &mut events);
                        }
                    }
                    _ => self.settle_reparent(&mut state, object, &mut events),
                }
            }
        }
        self.notify(events);
    }

    fn object_renamed(&self, object: &Arc<dyn LiveObject>) {
        let mut events = Vec::new();
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            let id = object.id();
            if !state.arena.contains(id) {
                return;
            }
            if self.must_queue(&state) {
                state.reparents.push(QueuedReparent {
                    id,
                    handle: Arc::downgrade(object),
                });
                self.schedule_flush(&mut state);
            } else if state.arena.rename(id, &object.object_name()) {
                state.stats.reparented += 1;
                Self::report_subtree(&state, id, &mut events);
            }
        }
        self.notify(events);
    }
}

impl Scene for ObjectTracker {
    fn object(&self, id: ObjectId) -> Option<Arc<dyn LiveObject>> {
        let guard = self.state.lock();
        let handle = guard.borrow().arena.handle(id);
        handle
    }

    fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        let guard = self.state.lock();
        let parent = guard.borrow().arena.get(id).and_then(|n| n.parent);
        parent
    }

    fn class_of(&self, id: ObjectId) -> Option<WidgetClass> {
        let guard = self.state.lock();
        let class = guard.borrow().arena.get(id).and_then(|n| n.class);
        class
    }

    fn path_of(&self, id: ObjectId) -> Option<String> {
        let guard = self.state.lock();
        let path = object_path(&guard.borrow().arena, id);
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gui::GuiLoop;
    use crate::host::MemoryHost;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<TrackerEvent>>,
    }

    impl TrackerObserver for EventLog {
        fn on_tracker_event(&self, event: &TrackerEvent) {
            self.events.lock().push(event.clone());
        }
    }

    impl EventLog {
        fn take(&self) -> Vec<TrackerEvent> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    fn setup() -> (GuiLoop, MemoryHost, Arc<ObjectTracker>, Arc<EventLog>) {
        let gui = GuiLoop::new();
        let tracker = ObjectTracker::new(gui.handle());
        let log = Arc::new(EventLog::default());
        tracker.subscribe(log.clone());
        let host = MemoryHost::new();
        host.attach(tracker.clone());
        (gui, host, tracker, log)
    }

    #[test]
    fn test_created_objects_become_known_with_paths() {
        let (_gui, host, tracker, log) = setup();
        let window = host.create_root("MainWindow", "main", None);
        let button = host.create(&window, "PushButton", "", None);

        assert!(tracker.is_known(window.id()));
        assert!(tracker.is_known(button.id()));
        assert_eq!(
            log.take(),
            vec![
                TrackerEvent::Created {
                    id: window.id(),
                    path: "n=main_0".into()
                },
                TrackerEvent::Created {
                    id: button.id(),
                    path: "n=main_0/c=PushButton_0".into()
                },
            ]
        );
    }

    #[test]
    fn test_add_object_registers_parents_first() {
        let gui = GuiLoop::new();
        let host = MemoryHost::new();
        let window = host.create_root("MainWindow", "", None);
        let frame = host.create(&window, "Frame", "", None);
        let button = host.create(&frame, "PushButton", "", None);

        let tracker = ObjectTracker::new(gui.handle());
        let log = Arc::new(EventLog::default());
        tracker.subscribe(log.clone());

        assert!(tracker.add_object(&button.as_live()));
        let ids: Vec<ObjectId> = log.take().iter().map(TrackerEvent::id).collect();
        assert_eq!(ids, vec![window.id(), frame.id(), button.id()]);

        // Idempotent
        assert!(tracker.add_object(&button.as_live()));
        assert!(log.take().is_empty());
        assert_eq!(tracker.known_count(), 3);
    }

    #[test]
    fn test_internal_objects_are_filtered() {
        let (_gui, host, tracker, _log) = setup();
        let overlay = host.create_root("WidgetReplay::Overlay", "", None);
        let child = host.create(&overlay, "Label", "", None);

        assert!(!tracker.is_known(overlay.id()));
        assert!(!tracker.is_known(child.id()));
        assert_eq!(tracker.stats().filtered, 2);
    }

    #[test]
    fn test_remove_is_idempotent_and_takes_subtree() {
        let (_gui, host, tracker, log) = setup();
        let window = host.create_root("MainWindow", "", None);
        let button = host.create(&window, "PushButton", "", None);
        log.take();

        tracker.remove_object(window.id());
        tracker.remove_object(window.id());
        assert_eq!(
            log.take(),
            vec![
                TrackerEvent::Destroyed { id: window.id() },
                TrackerEvent::Destroyed { id: button.id() },
            ]
        );
        assert_eq!(tracker.known_count(), 0);
    }

    #[test]
    fn test_off_thread_creation_is_queued_until_flush() {
        let (gui, host, tracker, _log) = setup();
        let window = host.create_root("MainWindow", "", None);

        let host = Arc::new(host);
        let remote = host.clone();
        let parent = window.clone();
        let child = std::thread::spawn(move || remote.create(&parent, "Worker", "", None))
            .join()
            .unwrap();

        assert!(!tracker.is_known(child.id()));
        assert_eq!(tracker.pending_count(), 1);

        gui.process_events();
        assert!(tracker.is_known(child.id()));
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_queued_destroy_cancels_queued_create() {
        let (gui, host, tracker, log) = setup();
        let window = host.create_root("MainWindow", "", None);
        log.take();

        let host = Arc::new(host);
        let remote = host.clone();
        let parent = window.clone();
        std::thread::spawn(move || {
            let temp = remote.create(&parent, "Tooltip", "", None);
            remote.destroy(&temp);
        })
        .join()
        .unwrap();

        assert_eq!(tracker.pending_count(), 0, "create and destroy cancel out");
        gui.process_events();
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_reparent_between_known_parents_is_immediate() {
        let (_gui, host, tracker, log) = setup();
        let window = host.create_root("MainWindow", "", None);
        let left = host.create(&window, "Frame", "left", None);
        let right = host.create(&window, "Frame", "right", None);
        let button = host.create(&left, "PushButton", "", None);
        log.take();

        host.reparent(&button, Some(&right));
        assert_eq!(
            log.take(),
            vec![TrackerEvent::Reparented {
                id: button.id(),
                path: "c=MainWindow_0/n=right_0/c=PushButton_0".into()
            }]
        );
        assert_eq!(tracker.parent(button.id()), Some(right.id()));
    }

    #[test]
    fn test_reparent_to_unknown_parent_registers_parent_then_defers() {
        let gui = GuiLoop::new();
        let host = MemoryHost::new();
        let window = host.create_root("MainWindow", "", None);
        let button = host.create(&window, "PushButton", "", None);

        let tracker = ObjectTracker::new(gui.handle());
        let log = Arc::new(EventLog::default());
        tracker.subscribe(log.clone());
        tracker.add_object(&button.as_live());

        // Created before the tracker was attached
        let frame = host.create(&window, "Frame", "", None);
        host.attach(tracker.clone());
        log.take();

        host.reparent(&button, Some(&frame));
        assert_eq!(
            log.take(),
            vec![TrackerEvent::Created {
                id: frame.id(),
                path: "c=MainWindow_0/c=Frame_0".into()
            }]
        );
        assert_eq!(tracker.parent(button.id()), Some(window.id()));
        assert_eq!(tracker.pending_count(), 1);

        gui.process_events();
        assert_eq!(tracker.parent(button.id()), Some(frame.id()));
        assert_eq!(
            log.take(),
            vec![TrackerEvent::Reparented {
                id: button.id(),
                path: "c=MainWindow_0/c=Frame_0/c=PushButton_0".into()
            }]
        );
    }

    #[test]
    fn test_reparent_under_internal_parent_forgets_object() {
        let (_gui, host, tracker, log) = setup();
        let window = host.create_root("MainWindow", "", None);
        let overlay = host.create_root("WidgetReplay::Overlay", "", None);
        let button = host.create(&window, "PushButton", "", None);
        log.take();

        host.reparent(&button, Some(&overlay));
        assert!(!tracker.is_known(button.id()));
        assert_eq!(log.take(), vec![TrackerEvent::Destroyed { id: button.id() }]);
    }

    #[test]
    fn test_reparent_while_queue_busy_is_coalesced() {
        let (gui, host, tracker, log) = setup();
        let window = host.create_root("MainWindow", "", None);
        let a = host.create(&window, "Frame", "a", None);
        let b = host.create(&window, "Frame", "b", None);
        let button = host.create(&window, "PushButton", "", None);
        log.take();

        {
            let _hook = tracker.enter_hook();
            host.reparent(&button, Some(&a));
            host.reparent(&button, Some(&b));
        }
        assert!(log.take().is_empty(), "nothing applied inside the hook");

        gui.process_events();
        assert_eq!(
            log.take(),
            vec![TrackerEvent::Reparented {
                id: button.id(),
                path: "c=MainWindow_0/n=b_0/c=PushButton_0".into()
            }]
        );
        assert_eq!(tracker.stats().flushes, 1);
    }

    #[test]
    fn test_reparent_reports_descendant_paths() {
        let (_gui, host, _tracker, log) = setup();
        let window = host.create_root("MainWindow", "", None);
        let target = host.create(&window, "Frame", "target", None);
        let group = host.create(&window, "GroupBox", "", None);
        let button = host.create(&group, "PushButton", "", None);
        log.take();

        host.reparent(&group, Some(&target));
        let events = log.take();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            TrackerEvent::Reparented {
                id: button.id(),
                path: "c=MainWindow_0/n=target_0/c=GroupBox_0/c=PushButton_0".into()
            }
        );
    }

    #[test]
    fn test_rename_refreshes_path() {
        let (_gui, host, tracker, log) = setup();
        let window = host.create_root("MainWindow", "", None);
        let button = host.create(&window, "PushButton", "", None);
        log.take();

        host.rename(&button, "submit");
        assert_eq!(
            log.take(),
            vec![TrackerEvent::Reparented {
                id: button.id(),
                path: "c=MainWindow_0/n=submit_0".into()
            }]
        );
        assert_eq!(
            tracker.find_by_path("c=MainWindow_0/n=submit_0"),
            Some(button.id())
        );
    }

    #[test]
    fn test_discover_existing_tree() {
        let gui = GuiLoop::new();
        let host = MemoryHost::new();
        let window = host.create_root("MainWindow", "", None);
        let frame = host.create(&window, "Frame", "", None);
        host.create(&frame, "PushButton", "", None);
        host.create(&frame, "PushButton", "", None);

        let tracker = ObjectTracker::new(gui.handle());
        assert_eq!(tracker.discover(&window.as_live()), 4);
        assert_eq!(tracker.known_count(), 4);

        let paths: Vec<String> = tracker.known_paths().into_iter().map(|(_, p)| p).collect();
        assert!(paths.contains(&"c=MainWindow_0/c=Frame_0/c=PushButton_1".to_string()));
    }

    #[test]
    fn test_sibling_index_ignores_registration_order() {
        let gui = GuiLoop::new();
        let host = MemoryHost::new();
        let window = host.create_root("MainWindow", "main", None);
        let first = host.create(&window, "PushButton", "", None);
        let second = host.create(&window, "PushButton", "", None);

        let recording = ObjectTracker::new(gui.handle());
        recording.add_object(&second.as_live());
        recording.discover(&window.as_live());

        let replaying = ObjectTracker::new(gui.handle());
        replaying.discover(&window.as_live());

        for (object, path) in [
            (&first, "n=main_0/c=PushButton_0"),
            (&second, "n=main_0/c=PushButton_1"),
        ] {
            assert_eq!(recording.path_of(object.id()).as_deref(), Some(path));
            assert_eq!(replaying.path_of(object.id()).as_deref(), Some(path));
        }
    }

    #[test]
    fn test_flushed_create_takes_its_host_position() {
        let (gui, host, tracker, _log) = setup();
        let window = host.create_root("MainWindow", "main", None);

        let host = Arc::new(host);
        let remote = host.clone();
        let parent = window.clone();
        let first = std::thread::spawn(move || remote.create(&parent, "PushButton", "", None))
            .join()
            .unwrap();
        let second = host.create(&window, "PushButton", "", None);
        assert!(!tracker.is_known(first.id()));
        assert_eq!(
            tracker.path_of(second.id()).as_deref(),
            Some("n=main_0/c=PushButton_0")
        );

        gui.process_events();
        assert_eq!(
            tracker.path_of(first.id()).as_deref(),
            Some("n=main_0/c=PushButton_0")
        );
        assert_eq!(
            tracker.path_of(second.id()).as_deref(),
            Some("n=main_0/c=PushButton_1")
        );
    }

    #[test]
    fn test_observer_may_query_tracker() {
        struct PathWatcher {
            tracker: Weak<ObjectTracker>,
            seen: Mutex<Vec<Option<String>>>,
        }
        impl TrackerObserver for PathWatcher {
            fn on_tracker_event(&self, event: &TrackerEvent) {
                let tracker = self.tracker.upgrade().unwrap();
                self.seen.lock().push(tracker.path_of(event.id()));
            }
        }

        let (_gui, host, tracker, _log) = setup();
        let watcher = Arc::new(PathWatcher {
            tracker: Arc::downgrade(&tracker),
            seen: Mutex::new(Vec::new()),
        });
        tracker.subscribe(watcher.clone());

        host.create_root("MainWindow", "main", None);
        assert_eq!(watcher.seen.lock().clone(), vec![Some("n=main_0".to_string())]);
    }

    #[test]
    fn test_scene_view() {
        let (_gui, host, tracker, _log) = setup();
        let window = host.create_root("MainWindow", "", Some(WidgetClass::Window));
        let button = host.create(&window, "PushButton", "ok", Some(WidgetClass::Button));

        assert_eq!(tracker.class_of(button.id()), Some(WidgetClass::Button));
        assert_eq!(tracker.parent(button.id()), Some(window.id()));
        assert!(tracker.object(button.id()).is_some());
        assert_eq!(tracker.path_of(button.id()).as_deref(), Some("c=MainWindow_0/n=ok_0"));
    }
}
