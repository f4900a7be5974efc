//! # Path Utilities
//!
//! Form fields are addressed by path strings in dot/bracket notation, e.g. `users[0].name`.
//! This module converts such strings into ordered [`PathSegment`]s, reads and writes values at
//! a path inside a `serde_json::Value` tree, and enumerates every reachable path of a tree.
//!
//! ```rust
//! use formstate::{PathSegment, get_property, object_paths, parse_path};
//! use serde_json::json;
//!
//! let state = json!({"users": [{"name": "John"}]});
//!
//! assert_eq!(
//!     parse_path("users[0].name"),
//!     vec![
//!         PathSegment::Key("users".to_string()),
//!         PathSegment::Index(0),
//!         PathSegment::Key("name".to_string()),
//!     ]
//! );
//! assert_eq!(get_property(&state, "users[0].name"), Some(&json!("John")));
//! assert_eq!(object_paths(&state), vec!["users", "users[0]", "users[0].name"]);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

///////////////////////////////////////////// PathSegment /////////////////////////////////////////////

/// One step of a path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A numeric array index, written `[n]` in path strings.
    Index(usize),
    /// An object key.
    Key(String),
}

impl PathSegment {
    /// Returns the segment as an array index, if it is one or is a key made only of digits.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(index) => Some(*index),
            PathSegment::Key(key) => parse_index(key),
        }
    }

    /// Returns true for the numeric variant.
    pub fn is_index(&self) -> bool {
        matches!(self, PathSegment::Index(_))
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PathSegment::Index(index) => write!(f, "{}", index),
            PathSegment::Key(key) => write!(f, "{}", key),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

fn parse_index(s: &str) -> Option<usize> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

////////////////////////////////////////////// Parsing //////////////////////////////////////////////

/// Splits a dot/bracket path into ordered segments.
///
/// Bracketed digits become [`PathSegment::Index`]; everything else, including digits between
/// dots (`users.0.name`), becomes a [`PathSegment::Key`].  A backslash escapes the next
/// character, so `a\.b` is the single key `a.b`.  Empty segments are skipped and the empty
/// string parses to no segments at all.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' if !in_brackets => flush_key(&mut current, &mut segments),
            '[' if !in_brackets => {
                flush_key(&mut current, &mut segments);
                in_brackets = true;
            }
            ']' if in_brackets => {
                let inner = std::mem::take(&mut current);
                match parse_index(&inner) {
                    Some(index) => segments.push(PathSegment::Index(index)),
                    None if !inner.is_empty() => segments.push(PathSegment::Key(inner)),
                    None => {}
                }
                in_brackets = false;
            }
            _ => current.push(c),
        }
    }

    if in_brackets {
        // An unterminated bracket is kept literally.
        current.insert(0, '[');
    }
    flush_key(&mut current, &mut segments);
    segments
}

fn flush_key(current: &mut String, segments: &mut Vec<PathSegment>) {
    if !current.is_empty() {
        segments.push(PathSegment::Key(std::mem::take(current)));
    }
}

/// Formats segments back into a path string, using brackets for indices.
pub fn format_path(segments: &[PathSegment]) -> String {
    let mut path = String::new();
    for segment in segments {
        match segment {
            PathSegment::Index(index) => path.push_str(&format!("[{}]", index)),
            PathSegment::Key(key) => {
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
            }
        }
    }
    path
}

////////////////////////////////////////////// Access //////////////////////////////////////////////

fn child<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(&segment.to_string()),
        Value::Array(items) => items.get(segment.as_index()?),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(&segment.to_string()),
        Value::Array(items) => items.get_mut(segment.as_index()?),
        _ => None,
    }
}

/// Reads the value at `path`, or `None` when any step along the way is missing.
///
/// The empty path addresses the tree itself.
pub fn get_property<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    parse_path(path)
        .iter()
        .try_fold(tree, |value, segment| child(value, segment))
}

/// Mutable counterpart of [`get_property`].
pub fn get_property_mut<'a>(tree: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    parse_path(path)
        .iter()
        .try_fold(tree, |value, segment| child_mut(value, segment))
}

/// Largest gap [`set_property`] will fill with `null` when writing past the end of an array.
pub const MAX_ARRAY_PADDING: usize = 1024;

/// Writes `value` at `path`, creating intermediate objects and arrays as needed.
///
/// Scalars that sit where a container is required are replaced.  Arrays are padded with
/// `null` when an index lies beyond their end, by at most [`MAX_ARRAY_PADDING`] slots.
/// Returns false without writing when a step cannot be taken: a non-numeric key into an
/// existing array, or an index too far past an array's end.  Containers created for earlier
/// steps are kept.
pub fn set_property(tree: &mut Value, path: &str, value: Value) -> bool {
    let segments = parse_path(path);
    let mut current = tree;
    for segment in &segments {
        match slot(current, segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    *current = value;
    true
}

fn slot<'a>(value: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    if !value.is_array() && !value.is_object() {
        *value = if segment.is_index() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }
    match value {
        Value::Array(items) => {
            let index = segment.as_index()?;
            if index >= items.len() {
                if index - items.len() >= MAX_ARRAY_PADDING {
                    return None;
                }
                items.resize(index.checked_add(1)?, Value::Null);
            }
            items.get_mut(index)
        }
        Value::Object(map) => Some(map.entry(segment.to_string()).or_insert(Value::Null)),
        _ => None,
    }
}

//////////////////////////////////////////// Enumeration ////////////////////////////////////////////

/// Enumerates every reachable path of a tree, depth-first and pre-order.
///
/// Both intermediate containers and leaves are listed.  Array indices are appended to their
/// parent in bracket notation (`users[0]`); object keys are joined with dots
/// (`users[0].name`).  A scalar tree has no paths.
pub fn object_paths(tree: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(tree, "", &mut paths);
    paths
}

fn collect_paths(value: &Value, prefix: &str, paths: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                paths.push(path.clone());
                collect_paths(child, &path, paths);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = format!("{}[{}]", prefix, index);
                paths.push(path.clone());
                collect_paths(child, &path, paths);
            }
        }
        _ => {}
    }
}
