//! In-Memory Host
//!
//! A small object graph that behaves like a widget toolkit closely enough to
//! drive recording and replay without a real GUI. Lifecycle changes are
//! reported to every attached [`LifecycleSink`].

use super::object::{
    HostError, ItemRef, ItemSelector, LiveObject, ObjectAction, ObjectId, Point, Size, Value,
    WidgetClass,
};
use super::LifecycleSink;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Height of one item row in item views
pub const ROW_HEIGHT: i32 = 20;

/// An object of the in-memory host
pub struct MemoryObject {
    id: ObjectId,
    type_name: String,
    class: Option<WidgetClass>,
    name: RwLock<String>,
    parent: RwLock<Option<Weak<MemoryObject>>>,
    children: RwLock<Vec<Arc<MemoryObject>>>,
    properties: RwLock<BTreeMap<String, Value>>,
    items: RwLock<Vec<String>>,
    columns: RwLock<i32>,
    expanded: RwLock<BTreeSet<Vec<i32>>>,
    size: RwLock<Size>,
    performed: Mutex<Vec<ObjectAction>>,
}

impl MemoryObject {
    fn new(id: ObjectId, type_name: &str, name: &str, class: Option<WidgetClass>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("visible".to_string(), Value::Bool(true));
        properties.insert("enabled".to_string(), Value::Bool(true));
        if matches!(class, Some(WidgetClass::CheckBox | WidgetClass::RadioButton)) {
            properties.insert("checkable".to_string(), Value::Bool(true));
            properties.insert("checked".to_string(), Value::Bool(false));
        }
        Self {
            id,
            type_name: type_name.to_string(),
            class,
            name: RwLock::new(name.to_string()),
            parent: RwLock::new(None),
            children: RwLock::new(Vec::new()),
            properties: RwLock::new(properties),
            items: RwLock::new(Vec::new()),
            columns: RwLock::new(1),
            expanded: RwLock::new(BTreeSet::new()),
            size: RwLock::new(Size::new(100, 30)),
            performed: Mutex::new(Vec::new()),
        }
    }

    /// Upcast to a trait object handle
    pub fn as_live(self: &Arc<Self>) -> Arc<dyn LiveObject> {
        self.clone()
    }

    /// Set a property without validation or notification
    pub fn set_property(&self, key: &str, value: impl Into<Value>) {
        self.properties.write().insert(key.to_string(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<Value> {
        self.get(key)
    }

    /// Replace the item model (rows of a list, combo popup or tab bar)
    pub fn set_items(&self, items: &[&str]) {
        *self.items.write() = items.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_columns(&self, columns: i32) {
        *self.columns.write() = columns.max(1);
    }

    pub fn set_size(&self, width: i32, height: i32) {
        *self.size.write() = Size::new(width, height);
    }

    /// Actions performed on this object, oldest first
    pub fn performed(&self) -> Vec<ObjectAction> {
        self.performed.lock().clone()
    }

    pub fn is_expanded(&self, rows: &[i32]) -> bool {
        self.expanded.read().contains(rows)
    }

    pub fn memory_parent(&self) -> Option<Arc<MemoryObject>> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }

    pub fn memory_children(&self) -> Vec<Arc<MemoryObject>> {
        self.children.read().clone()
    }

    fn is_checkable(&self) -> bool {
        self.get("checkable").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    fn toggle_checked(&self) {
        let mut props = self.properties.write();
        let checked = props.get("checked").and_then(Value::as_bool).unwrap_or(false);
        let next = if self.class == Some(WidgetClass::RadioButton) {
            true
        } else {
            !checked
        };
        props.insert("checked".to_string(), Value::Bool(next));
    }

    fn select_index(&self, index: i32) -> Result<(), HostError> {
        let items = self.items.read();
        let text = usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i))
            .ok_or_else(|| HostError::InvalidValue {
                property: "currentIndex".to_string(),
                reason: format!("index {} out of range (0..{})", index, items.len()),
            })?
            .clone();
        drop(items);
        let mut props = self.properties.write();
        props.insert("currentIndex".to_string(), Value::Int(index as i64));
        props.insert("currentText".to_string(), Value::Text(text));
        Ok(())
    }

    fn item_exists(&self, rows: &[i32]) -> bool {
        match rows.first() {
            Some(&row) => row >= 0 && (row as usize) < self.items.read().len(),
            None => false,
        }
    }

    fn check_value_range(&self, value: &Value) -> Result<(), HostError> {
        let Some(v) = value.as_f64() else {
            return Ok(());
        };
        let props = self.properties.read();
        let min = props.get("minimum").and_then(Value::as_f64);
        let max = props.get("maximum").and_then(Value::as_f64);
        if min.is_some_and(|m| v < m) || max.is_some_and(|m| v > m) {
            return Err(HostError::InvalidValue {
                property: "value".to_string(),
                reason: format!("{} is outside [{:?}, {:?}]", v, min, max),
            });
        }
        Ok(())
    }
}

impl LiveObject for MemoryObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn object_name(&self) -> String {
        self.name.read().clone()
    }

    fn parent(&self) -> Option<Arc<dyn LiveObject>> {
        self.memory_parent().map(|p| p as Arc<dyn LiveObject>)
    }

    fn children(&self) -> Vec<Arc<dyn LiveObject>> {
        self.children
            .read()
            .iter()
            .map(|c| c.clone() as Arc<dyn LiveObject>)
            .collect()
    }

    fn class(&self) -> Option<WidgetClass> {
        self.class
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "objectName" => Some(Value::Text(self.object_name())),
            "columnCount" => Some(Value::Int(*self.columns.read() as i64)),
            "count" => {
                let count = self.items.read().len();
                if count > 0 {
                    Some(Value::Int(count as i64))
                } else {
                    self.properties.read().get(property).cloned()
                }
            }
            _ => self.properties.read().get(property).cloned(),
        }
    }

    fn set(&self, property: &str, value: Value) -> Result<(), HostError> {
        match property {
            "objectName" | "count" | "columnCount" => {
                Err(HostError::ReadOnly(property.to_string()))
            }
            "value" => {
                match &value {
                    Value::List(pair) => {
                        for v in pair {
                            self.check_value_range(v)?;
                        }
                    }
                    v => self.check_value_range(v)?,
                }
                self.properties.write().insert(property.to_string(), value);
                Ok(())
            }
            "checked" if !self.is_checkable() => Err(HostError::InvalidValue {
                property: property.to_string(),
                reason: "object is not checkable".to_string(),
            }),
            _ => {
                self.properties.write().insert(property.to_string(), value);
                Ok(())
            }
        }
    }

    fn perform(&self, action: &ObjectAction) -> Result<(), HostError> {
        match action {
            ObjectAction::Click { double } => {
                if self.is_checkable() {
                    self.toggle_checked();
                    if *double {
                        self.toggle_checked();
                    }
                }
            }
            ObjectAction::Step(delta) => {
                let current = self.get("value").and_then(|v| v.as_i64()).unwrap_or(0);
                let next = Value::Int(current + *delta as i64);
                self.check_value_range(&next)?;
                self.properties.write().insert("value".to_string(), next);
            }
            ObjectAction::SelectItem(ItemSelector::Index(index)) => self.select_index(*index)?,
            ObjectAction::SelectItem(ItemSelector::Text(text)) => {
                let index = self
                    .items
                    .read()
                    .iter()
                    .position(|t| t == text)
                    .ok_or_else(|| HostError::InvalidValue {
                        property: "currentText".to_string(),
                        reason: format!("no item with text '{}'", text),
                    })?;
                self.select_index(index as i32)?;
            }
            ObjectAction::ClickItem { index, .. } => {
                if !self.item_exists(index) {
                    return Err(HostError::InvalidValue {
                        property: "currentIndex".to_string(),
                        reason: format!("no item at {:?}", index),
                    });
                }
                let list = index.iter().map(|i| Value::Int(*i as i64)).collect();
                self.properties
                    .write()
                    .insert("currentIndex".to_string(), Value::List(list));
            }
            ObjectAction::Expand(rows) => {
                if !self.item_exists(rows) {
                    return Err(HostError::InvalidValue {
                        property: "expanded".to_string(),
                        reason: format!("no item at {:?}", rows),
                    });
                }
                self.expanded.write().insert(rows.clone());
            }
            ObjectAction::Collapse(rows) => {
                self.expanded.write().remove(rows);
            }
            ObjectAction::Trigger { checked } => {
                if let Some(c) = checked {
                    self.properties
                        .write()
                        .insert("checked".to_string(), Value::Bool(*c));
                }
                let count = self.get("triggerCount").and_then(|v| v.as_i64()).unwrap_or(0);
                self.properties
                    .write()
                    .insert("triggerCount".to_string(), Value::Int(count + 1));
            }
            ObjectAction::SetSelection(cells) => {
                let list = cells
                    .iter()
                    .map(|c| Value::Text(format!("{}:{}", c.row, c.column)))
                    .collect();
                self.properties
                    .write()
                    .insert("selection".to_string(), Value::List(list));
            }
            ObjectAction::ClearSelection => {
                self.properties
                    .write()
                    .insert("selection".to_string(), Value::List(Vec::new()));
            }
            ObjectAction::SetItemText { index, text } => {
                let row = index.first().copied().unwrap_or(-1);
                let mut items = self.items.write();
                let slot = usize::try_from(row)
                    .ok()
                    .and_then(|r| items.get_mut(r))
                    .ok_or_else(|| HostError::InvalidValue {
                        property: "text".to_string(),
                        reason: format!("no item at {:?}", index),
                    })?;
                *slot = text.clone();
            }
            ObjectAction::Close => {
                self.properties
                    .write()
                    .insert("visible".to_string(), Value::Bool(false));
            }
            ObjectAction::Press | ObjectAction::MouseClick { .. } | ObjectAction::Key(_) => {}
        }
        self.performed.lock().push(action.clone());
        Ok(())
    }

    fn is_visible(&self) -> bool {
        self.get("visible").and_then(|v| v.as_bool()).unwrap_or(true)
    }

    fn is_enabled(&self) -> bool {
        self.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true)
    }

    fn size(&self) -> Size {
        *self.size.read()
    }

    fn item_at(&self, pos: Point) -> Option<ItemRef> {
        let items = self.items.read();
        if items.is_empty() || pos.x < 0 || pos.y < 0 {
            return None;
        }
        let row = pos.y / ROW_HEIGHT;
        let text = items.get(row as usize)?;
        let columns = *self.columns.read();
        let width = self.size.read().width.max(1);
        let column = (pos.x * columns / width).min(columns - 1);
        Some(ItemRef::flat(row, column, text.clone()))
    }

    fn find_item(&self, text: &str) -> Option<ItemRef> {
        self.items
            .read()
            .iter()
            .position(|t| t == text)
            .map(|row| ItemRef::flat(row as i32, 0, text))
    }
}

/// The in-memory application: owns top-level objects and reports lifecycle
#[derive(Default)]
pub struct MemoryHost {
    next_id: AtomicU64,
    roots: RwLock<Vec<Arc<MemoryObject>>>,
    sinks: RwLock<Vec<Arc<dyn LifecycleSink>>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Attach a lifecycle receiver
    pub fn attach(&self, sink: Arc<dyn LifecycleSink>) {
        self.sinks.write().push(sink);
    }

    pub fn roots(&self) -> Vec<Arc<MemoryObject>> {
        self.roots.read().clone()
    }

    fn allocate_id(&self) -> ObjectId {
        ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed).max(1))
    }

    fn sinks(&self) -> Vec<Arc<dyn LifecycleSink>> {
        self.sinks.read().clone()
    }

    /// Create a top-level object
    pub fn create_root(
        &self,
        type_name: &str,
        name: &str,
        class: Option<WidgetClass>,
    ) -> Arc<MemoryObject> {
        let object = Arc::new(MemoryObject::new(self.allocate_id(), type_name, name, class));
        self.roots.write().push(object.clone());
        for sink in self.sinks() {
            sink.object_created(&object.as_live());
        }
        object
    }

    /// Create a child object, appended to the parent's children
    pub fn create(
        &self,
        parent: &Arc<MemoryObject>,
        type_name: &str,
        name: &str,
        class: Option<WidgetClass>,
    ) -> Arc<MemoryObject> {
        let object = Arc::new(MemoryObject::new(self.allocate_id(), type_name, name, class));
        *object.parent.write() = Some(Arc::downgrade(parent));
        parent.children.write().push(object.clone());
        for sink in self.sinks() {
            sink.object_created(&object.as_live());
        }
        object
    }

    /// Destroy an object and its subtree
    pub fn destroy(&self, object: &Arc<MemoryObject>) {
        match object.memory_parent() {
            Some(parent) => parent.children.write().retain(|c| c.id != object.id),
            None => self.roots.write().retain(|c| c.id != object.id),
        }
        let mut doomed = vec![object.id];
        collect_descendants(object, &mut doomed);
        *object.parent.write() = None;
        for sink in self.sinks() {
            for id in &doomed {
                sink.object_destroyed(*id);
            }
        }
    }

    /// Move an object under a new parent, or make it top-level
    pub fn reparent(&self, object: &Arc<MemoryObject>, new_parent: Option<&Arc<MemoryObject>>) {
        match object.memory_parent() {
            Some(parent) => parent.children.write().retain(|c| c.id != object.id),
            None => self.roots.write().retain(|c| c.id != object.id),
        }
        match new_parent {
            Some(parent) => {
                *object.parent.write() = Some(Arc::downgrade(parent));
                parent.children.write().push(object.clone());
            }
            None => {
                *object.parent.write() = None;
                self.roots.write().push(object.clone());
            }
        }
        for sink in self.sinks() {
            sink.object_reparented(&object.as_live());
        }
    }

    pub fn rename(&self, object: &Arc<MemoryObject>, name: &str) {
        *object.name.write() = name.to_string();
        for sink in self.sinks() {
            sink.object_renamed(&object.as_live());
        }
    }

    /// First object with the given name, depth first
    pub fn find_by_name(&self, name: &str) -> Option<Arc<MemoryObject>> {
        fn visit(object: &Arc<MemoryObject>, name: &str) -> Option<Arc<MemoryObject>> {
            if *object.name.read() == name {
                return Some(object.clone());
            }
            object
                .memory_children()
                .iter()
                .find_map(|child| visit(child, name))
        }
        self.roots().iter().find_map(|root| visit(root, name))
    }
}

fn collect_descendants(object: &Arc<MemoryObject>, out: &mut Vec<ObjectId>) {
    for child in object.memory_children() {
        out.push(child.id);
        collect_descendants(&child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::object::SelectionCell;
    use crate::host::CellIndex;

    #[derive(Default)]
    struct RecordingSink {
        log: Mutex<Vec<String>>,
    }

    impl LifecycleSink for RecordingSink {
        fn object_created(&self, object: &Arc<dyn LiveObject>) {
            self.log.lock().push(format!("create {}", object.id().0));
        }
        fn object_destroyed(&self, id: ObjectId) {
            self.log.lock().push(format!("destroy {}", id.0));
        }
        fn object_reparented(&self, object: &Arc<dyn LiveObject>) {
            self.log.lock().push(format!("reparent {}", object.id().0));
        }
        fn object_renamed(&self, object: &Arc<dyn LiveObject>) {
            self.log.lock().push(format!("rename {}", object.id().0));
        }
    }

    #[test]
    fn test_lifecycle_notifications() {
        let host = MemoryHost::new();
        let sink = Arc::new(RecordingSink::default());
        host.attach(sink.clone());

        let window = host.create_root("MainWindow", "main", Some(WidgetClass::Window));
        let button = host.create(&window, "PushButton", "ok", Some(WidgetClass::Button));
        host.rename(&button, "accept");
        host.reparent(&button, None);
        host.destroy(&window);

        let log = sink.log.lock().clone();
        assert_eq!(
            log,
            vec![
                format!("create {}", window.id().0),
                format!("create {}", button.id().0),
                format!("rename {}", button.id().0),
                format!("reparent {}", button.id().0),
                format!("destroy {}", window.id().0),
            ]
        );
        assert_eq!(host.roots().len(), 1);
    }

    #[test]
    fn test_checkbox_click_toggles() {
        let host = MemoryHost::new();
        let window = host.create_root("MainWindow", "", Some(WidgetClass::Window));
        let check = host.create(&window, "CheckBox", "agree", Some(WidgetClass::CheckBox));

        check.perform(&ObjectAction::Click { double: false }).unwrap();
        assert_eq!(check.get("checked"), Some(Value::Bool(true)));

        check.perform(&ObjectAction::Click { double: true }).unwrap();
        assert_eq!(check.get("checked"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_plain_button_rejects_checked() {
        let host = MemoryHost::new();
        let button = host.create_root("PushButton", "b", Some(WidgetClass::Button));
        assert!(button.set("checked", Value::Bool(true)).is_err());
    }

    #[test]
    fn test_value_range_enforced() {
        let host = MemoryHost::new();
        let spin = host.create_root("SpinBox", "spin", Some(WidgetClass::SpinBox));
        spin.set_property("minimum", 0);
        spin.set_property("maximum", 10);
        spin.set_property("value", 9);

        spin.perform(&ObjectAction::Step(1)).unwrap();
        assert_eq!(spin.get("value"), Some(Value::Int(10)));
        assert!(spin.perform(&ObjectAction::Step(1)).is_err());
        assert!(spin.set("value", Value::Int(-1)).is_err());
    }

    #[test]
    fn test_select_item_by_text() {
        let host = MemoryHost::new();
        let combo = host.create_root("ComboBox", "fruit", Some(WidgetClass::ComboBox));
        combo.set_items(&["apple", "pear", "plum"]);

        combo
            .perform(&ObjectAction::SelectItem(ItemSelector::Text("plum".into())))
            .unwrap();
        assert_eq!(combo.get("currentIndex"), Some(Value::Int(2)));
        assert_eq!(combo.get("count"), Some(Value::Int(3)));
        assert!(combo
            .perform(&ObjectAction::SelectItem(ItemSelector::Index(7)))
            .is_err());
    }

    #[test]
    fn test_item_at_maps_rows_and_columns() {
        let host = MemoryHost::new();
        let table = host.create_root("TableView", "grid", Some(WidgetClass::ItemView));
        table.set_items(&["r0", "r1", "r2"]);
        table.set_columns(2);
        table.set_size(200, 60);

        let item = table.item_at(Point::new(150, 25)).unwrap();
        assert_eq!(item.rows, vec![1]);
        assert_eq!(item.column, 1);
        assert_eq!(item.text, "r1");
        assert!(table.item_at(Point::new(10, 200)).is_none());
        assert_eq!(table.find_item("r2").map(|i| i.rows), Some(vec![2]));
        assert_eq!(table.get("columnCount"), Some(Value::Int(2)));
    }

    #[test]
    fn test_selection_and_close() {
        let host = MemoryHost::new();
        let view = host.create_root("TableView", "grid", Some(WidgetClass::ItemView));
        view.perform(&ObjectAction::SetSelection(vec![SelectionCell {
            row: CellIndex::At(1),
            column: CellIndex::All,
        }]))
        .unwrap();
        assert_eq!(
            view.get("selection"),
            Some(Value::List(vec![Value::from("1:'ALL'")]))
        );

        view.perform(&ObjectAction::Close).unwrap();
        assert!(!view.is_visible());
        assert_eq!(view.performed().len(), 2);
    }

    #[test]
    fn test_find_by_name() {
        let host = MemoryHost::new();
        let window = host.create_root("MainWindow", "main", None);
        let frame = host.create(&window, "Frame", "", None);
        let button = host.create(&frame, "PushButton", "deep", None);

        assert_eq!(host.find_by_name("deep").map(|b| b.id()), Some(button.id()));
        assert!(host.find_by_name("missing").is_none());
    }
}
