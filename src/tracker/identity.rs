//! Identity Resolver
//!
//! Computes the path string that names an object in scripts:
//! `/`-joined components from the root, each `n=<name>_<idx>` for named
//! objects or `c=<canonical type>_<idx>` otherwise. The index counts earlier
//! siblings with the same key.
//!
//! Paths are unique among current siblings and deterministic for a fixed
//! child order. They are not stable across structural changes, and type
//! suffixes generated by the host runtime are stripped because their
//! numbering changes between runs.

use crate::host::ObjectId;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Path component separator
pub const SEPARATOR: char = '/';

/// Deepest ancestry walked before a path is considered malformed
const MAX_PATH_DEPTH: usize = 256;

/// Generated type-name suffixes (`_QML_12`, `_QMLTYPE_3` and combinations)
static GENERATED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(?:QMLTYPE|QML)_\d+").expect("valid regex"));

/// Read access to an object hierarchy
pub trait Hierarchy {
    fn parent_of(&self, id: ObjectId) -> Option<ObjectId>;

    /// Children in host order
    fn children_of(&self, id: ObjectId) -> &[ObjectId];

    /// Top-level objects in registration order
    fn roots(&self) -> &[ObjectId];

    fn name_of(&self, id: ObjectId) -> Option<&str>;

    fn type_of(&self, id: ObjectId) -> Option<&str>;
}

/// Key part of a path component
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentKey {
    /// User-assigned object name
    Name(String),
    /// Canonical type name
    Type(String),
}

/// One `/`-separated path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathComponent {
    pub key: ComponentKey,
    pub index: usize,
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            ComponentKey::Name(name) => write!(f, "n={}_{}", name, self.index),
            ComponentKey::Type(ty) => write!(f, "c={}_{}", ty, self.index),
        }
    }
}

impl FromStr for PathComponent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s
            .split_once('=')
            .ok_or_else(|| format!("path component '{}' has no key prefix", s))?;
        let (key, index) = rest
            .rsplit_once('_')
            .ok_or_else(|| format!("path component '{}' has no sibling index", s))?;
        let index = index
            .parse::<usize>()
            .map_err(|_| format!("path component '{}' has an invalid sibling index", s))?;
        if key.is_empty() {
            return Err(format!("path component '{}' has an empty key", s));
        }
        let key = match prefix {
            "n" => ComponentKey::Name(key.to_string()),
            "c" => ComponentKey::Type(key.to_string()),
            other => return Err(format!("unknown path component prefix '{}'", other)),
        };
        Ok(PathComponent { key, index })
    }
}

/// Strip generated suffixes from a runtime type name.
///
/// A suffix at the very start of the name is kept, so the result is never
/// empty for a non-empty input.
pub fn canonical_type(type_name: &str) -> Cow<'_, str> {
    let mut out = String::new();
    let mut last = 0;
    for m in GENERATED_SUFFIX.find_iter(type_name) {
        if m.start() == 0 {
            continue;
        }
        out.push_str(&type_name[last..m.start()]);
        last = m.end();
    }
    if last == 0 {
        return Cow::Borrowed(type_name);
    }
    out.push_str(&type_name[last..]);
    Cow::Owned(out)
}

/// Component key of a known object
pub fn component_key<H: Hierarchy + ?Sized>(hierarchy: &H, id: ObjectId) -> Option<ComponentKey> {
    match hierarchy.name_of(id) {
        Some(name) if !name.is_empty() => Some(ComponentKey::Name(name.to_string())),
        _ => hierarchy
            .type_of(id)
            .map(|ty| ComponentKey::Type(canonical_type(ty).into_owned())),
    }
}

fn siblings<H: Hierarchy + ?Sized>(hierarchy: &H, id: ObjectId) -> &[ObjectId] {
    match hierarchy.parent_of(id) {
        Some(parent) => hierarchy.children_of(parent),
        None => hierarchy.roots(),
    }
}

/// Path component of a known object
pub fn path_component<H: Hierarchy + ?Sized>(hierarchy: &H, id: ObjectId) -> Option<PathComponent> {
    let key = component_key(hierarchy, id)?;
    let index = siblings(hierarchy, id)
        .iter()
        .take_while(|sibling| **sibling != id)
        .filter(|sibling| component_key(hierarchy, **sibling).as_ref() == Some(&key))
        .count();
    Some(PathComponent { key, index })
}

/// Full path of a known object, root first
pub fn object_path<H: Hierarchy + ?Sized>(hierarchy: &H, id: ObjectId) -> Option<String> {
    let mut components = Vec::new();
    let mut current = Some(id);
    while let Some(c) = current {
        if components.len() >= MAX_PATH_DEPTH {
            return None;
        }
        components.push(path_component(hierarchy, c)?.to_string());
        current = hierarchy.parent_of(c);
    }
    components.reverse();
    Some(components.join(&SEPARATOR.to_string()))
}

/// Parse a path into components
pub fn parse_path(path: &str) -> Result<Vec<PathComponent>, String> {
    if path.is_empty() {
        return Err("empty object path".to_string());
    }
    path.split(SEPARATOR).map(str::parse).collect()
}

/// Path of the parent, `None` for top-level paths
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// Walk a path down from the roots
pub fn resolve_path<H: Hierarchy + ?Sized>(hierarchy: &H, path: &str) -> Option<ObjectId> {
    let components = parse_path(path).ok()?;
    let mut level: &[ObjectId] = hierarchy.roots();
    let mut found = None;
    for component in components {
        let mut seen = 0;
        let mut matched = None;
        for candidate in level {
            if component_key(hierarchy, *candidate).as_ref() == Some(&component.key) {
                if seen == component.index {
                    matched = Some(*candidate);
                    break;
                }
                seen += 1;
            }
        }
        let id = matched?;
        level = hierarchy.children_of(id);
        found = Some(id);
    }
    found
}
