//! Host Runtime Interface
//!
//! The engine never talks to a concrete GUI toolkit. The host supplies objects
//! through the [`LiveObject`] trait and reports their lifecycle through a
//! [`LifecycleSink`]. The [`memory`] host backs tests and demos.

pub mod memory;
pub mod object;

pub use memory::{MemoryHost, MemoryObject};
pub use object::{
    CellIndex, HostError, ItemRef, ItemSelector, LiveObject, ObjectAction, ObjectId, Point,
    SelectionCell, Size, Value, WidgetClass,
};

use std::sync::Arc;

/// Receiver of host lifecycle notifications.
///
/// Notifications may arrive on any thread.
pub trait LifecycleSink: Send + Sync {
    /// A new object finished construction.
    fn object_created(&self, object: &Arc<dyn LiveObject>);

    /// An object is being destroyed. Its handle may already be gone.
    fn object_destroyed(&self, id: ObjectId);

    /// An object moved to a new parent (or became top-level).
    fn object_reparented(&self, object: &Arc<dyn LiveObject>);

    /// An object's user-assigned name changed.
    fn object_renamed(&self, object: &Arc<dyn LiveObject>);
}
