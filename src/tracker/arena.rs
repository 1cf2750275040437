//! Object Arena
//!
//! Mirror of the host object graph keyed by [`ObjectId`]. Parent and child
//! links are ids, never owning pointers. Removing a node invalidates its id.

use super::identity::Hierarchy;
use crate::host::{LiveObject, ObjectId, WidgetClass};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// One known object
#[derive(Clone)]
pub struct ObjectNode {
    pub id: ObjectId,
    pub type_name: String,
    pub name: String,
    pub class: Option<WidgetClass>,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    handle: Weak<dyn LiveObject>,
}

impl ObjectNode {
    /// Snapshot a live object. Parent and children are filled by the arena.
    pub fn from_live(object: &Arc<dyn LiveObject>) -> Self {
        Self {
            id: object.id(),
            type_name: object.type_name(),
            name: object.object_name(),
            class: object.class(),
            parent: None,
            children: Vec::new(),
            handle: Arc::downgrade(object),
        }
    }

    /// Upgrade the weak handle; `None` once the host dropped the object
    pub fn handle(&self) -> Option<Arc<dyn LiveObject>> {
        self.handle.upgrade()
    }
}

impl std::fmt::Debug for ObjectNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectNode")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}

/// Arena of known objects
#[derive(Debug, Default)]
pub struct ObjectArena {
    nodes: HashMap<ObjectId, ObjectNode>,
    roots: Vec<ObjectId>,
}

impl ObjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectNode> {
        self.nodes.get(&id)
    }

    pub fn handle(&self, id: ObjectId) -> Option<Arc<dyn LiveObject>> {
        self.nodes.get(&id).and_then(ObjectNode::handle)
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.nodes.keys().copied()
    }

    /// Insert a node under `parent`. The parent must already be known and the
    /// node must not be. Returns false if either condition fails.
    pub fn insert(&mut self, mut node: ObjectNode, parent: Option<ObjectId>) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        match parent {
            Some(pid) => {
                if !self.attach_child(pid, node.id) {
                    return false;
                }
            }
            None => self.roots.push(node.id),
        }
        node.parent = parent;
        node.children.clear();
        self.nodes.insert(node.id, node);
        true
    }

    /// Remove a node and its known descendants. Returns removed ids, the
    /// node first and descendants depth first.
    pub fn remove(&mut self, id: ObjectId) -> Vec<ObjectId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let parent = node.parent;
        self.detach(id, parent);

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                removed.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        removed
    }

    /// Move a known node under another known node (or to the top level).
    /// Fails if either id is unknown or the move would create a cycle.
    pub fn reparent(&mut self, id: ObjectId, new_parent: Option<ObjectId>) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let old_parent = node.parent;
        if old_parent == new_parent {
            return true;
        }
        if let Some(pid) = new_parent {
            if !self.nodes.contains_key(&pid) || self.is_ancestor_or_self(id, pid) {
                return false;
            }
        }
        self.detach(id, old_parent);
        match new_parent {
            Some(pid) => {
                self.attach_child(pid, id);
            }
            None => self.roots.push(id),
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = new_parent;
        }
        true
    }

    /// Update the stored name. Returns true if it changed.
    pub fn rename(&mut self, id: ObjectId, name: &str) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) if node.name != name => {
                node.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    /// True if `ancestor` is `id` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.nodes.get(&c).and_then(|n| n.parent);
        }
        false
    }

    /// All known descendants of `id`, depth first
    pub fn descendants(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjectId> = self
            .nodes
            .get(&id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Link `id` under `parent` at its place in the host's child order, so
    /// sibling indexes do not depend on registration order. Children the host
    /// does not list go last.
    fn attach_child(&mut self, parent: ObjectId, id: ObjectId) -> bool {
        let Some(node) = self.nodes.get(&parent) else {
            return false;
        };
        let order: HashMap<ObjectId, usize> = node
            .handle()
            .map(|p| p.children())
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, child)| (child.id(), i))
            .collect();

        let Some(p) = self.nodes.get_mut(&parent) else {
            return false;
        };
        let slot = match order.get(&id) {
            Some(position) => p
                .children
                .iter()
                .position(|c| order.get(c).map_or(true, |other| other > position))
                .unwrap_or(p.children.len()),
            None => p.children.len(),
        };
        p.children.insert(slot, id);
        true
    }

    fn detach(&mut self, id: ObjectId, parent: Option<ObjectId>) {
        match parent {
            Some(pid) => {
                if let Some(p) = self.nodes.get_mut(&pid) {
                    p.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
    }
}

impl Hierarchy for ObjectArena {
    fn parent_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    fn children_of(&self, id: ObjectId) -> &[ObjectId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    fn name_of(&self, id: ObjectId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.name.as_str())
    }

    fn type_of(&self, id: ObjectId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.type_name.as_str())
    }
}
