//! Replay-side object registry
//!
//! Bidirectional `path <-> ObjectId` maps fed by the tracker's events.

use crate::host::ObjectId;
use crate::tracker::{ObjectTracker, Scene, TrackerEvent, TrackerObserver};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct Maps {
    by_path: HashMap<String, ObjectId>,
    by_id: HashMap<ObjectId, String>,
}

impl Maps {
    fn insert(&mut self, id: ObjectId, path: &str) {
        if let Some(old) = self.by_id.insert(id, path.to_string()) {
            if self.by_path.get(&old) == Some(&id) {
                self.by_path.remove(&old);
            }
        }
        self.by_path.insert(path.to_string(), id);
    }

    fn remove(&mut self, id: ObjectId) {
        if let Some(path) = self.by_id.remove(&id) {
            if self.by_path.get(&path) == Some(&id) {
                self.by_path.remove(&path);
            }
        }
    }
}

/// Path lookup for the runner
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    maps: RwLock<Maps>,
}

impl ObjectRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a registry seeded with the tracker's current objects and
    /// subscribed to its changes
    pub fn attach(tracker: &ObjectTracker) -> Arc<Self> {
        let registry = Self::new();
        registry.sync(tracker);
        tracker.subscribe(registry.clone());
        registry
    }

    /// Replace the maps with the tracker's current view
    pub fn sync(&self, tracker: &ObjectTracker) {
        let mut maps = Maps::default();
        for (id, path) in tracker.known_paths() {
            maps.insert(id, &path);
        }
        *self.maps.write() = maps;
    }

    pub fn id_of(&self, path: &str) -> Option<ObjectId> {
        self.maps.read().by_path.get(path).copied()
    }

    pub fn path_of(&self, id: ObjectId) -> Option<String> {
        self.maps.read().by_id.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.maps.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve `path`, correcting stale entries from the tracker.
    ///
    /// Sibling indexes shift when a sibling goes away without the moved
    /// objects being reported, so a hit is checked against the tracker's
    /// current path before it is trusted.
    pub fn resolve(&self, tracker: &ObjectTracker, path: &str) -> Option<ObjectId> {
        if let Some(id) = self.id_of(path) {
            if tracker.path_of(id).as_deref() == Some(path) {
                return Some(id);
            }
        }
        let id = tracker.find_by_path(path)?;
        trace!(path, id = %id, "Registry refreshed from tracker");
        self.maps.write().insert(id, path);
        Some(id)
    }
}

impl TrackerObserver for ObjectRegistry {
    fn on_tracker_event(&self, event: &TrackerEvent) {
        let mut maps = self.maps.write();
        match event {
            TrackerEvent::Created { id, path } | TrackerEvent::Reparented { id, path } => {
                maps.insert(*id, path)
            }
            TrackerEvent::Destroyed { id } => maps.remove(*id),
        }
    }
}
