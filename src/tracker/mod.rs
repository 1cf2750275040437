//! Object Tracking
//!
//! Live mirror of the host object graph and the path names derived from it.
//!
//! - [`arena`]: id-keyed graph storage
//! - [`identity`]: path computation and parsing
//! - [`object_tracker`]: lifecycle hooks, queues and observers

pub mod arena;
pub mod identity;
pub mod object_tracker;

pub use arena::{ObjectArena, ObjectNode};
pub use identity::{canonical_type, object_path, Hierarchy, PathComponent};
pub use object_tracker::{
    LifecycleKind, ObjectTracker, PendingLifecycle, TrackerEvent, TrackerObserver, TrackerStats,
};

use crate::host::{LiveObject, ObjectId, WidgetClass};
use std::sync::Arc;

/// Read view of the tracked object graph used by classification
pub trait Scene {
    /// Live handle of a known object
    fn object(&self, id: ObjectId) -> Option<Arc<dyn LiveObject>>;

    fn parent(&self, id: ObjectId) -> Option<ObjectId>;

    /// Widget class recorded when the object became known
    fn class_of(&self, id: ObjectId) -> Option<WidgetClass>;

    fn path_of(&self, id: ObjectId) -> Option<String>;
}

/// Find `class` on `id` or one of its ancestors.
///
/// Returns the matching object and the iteration it was found on (1 is the
/// object itself). Gives up after `limit` levels.
pub fn find_ancestor(
    scene: &dyn Scene,
    id: ObjectId,
    class: WidgetClass,
    limit: usize,
) -> Option<(ObjectId, usize)> {
    let mut current = Some(id);
    let mut iteration = 0;
    while let Some(c) = current {
        iteration += 1;
        if iteration > limit {
            return None;
        }
        if scene.class_of(c) == Some(class) {
            return Some((c, iteration));
        }
        current = scene.parent(c);
    }
    None
}

/// True if `ancestor` is `id` or one of its ancestors within `limit` levels
pub fn is_within(scene: &dyn Scene, ancestor: ObjectId, id: ObjectId, limit: usize) -> bool {
    let mut current = Some(id);
    let mut steps = 0;
    while let Some(c) = current {
        if c == ancestor {
            return true;
        }
        steps += 1;
        if steps >= limit {
            return false;
        }
        current = scene.parent(c);
    }
    false
}
