//! The canonical config tree: a flat map from slash-delimited key paths to values.
//!
//! Trees are stored flat and only turned into nested mappings at the projection
//! boundary. Both fetch modes produce a [`ConfigTree`]; [`ConfigTree::unflatten`]
//! is where key validity is enforced.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{ConfigError, Result};

/// Separator between key path segments.
pub const SEPARATOR: char = '/';

/// Flat key-path → value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    entries: BTreeMap<String, Value>,
}

impl ConfigTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value at a key path.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Value stored at an exact key path.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Key paths in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Flatten a nested mapping into slash-delimited key paths.
    ///
    /// Non-empty mappings become path levels; everything else, including
    /// empty mappings and lists, is a leaf.
    pub fn flatten(nested: &Map<String, Value>) -> Self {
        let mut tree = Self::new();
        flatten_into(&mut tree.entries, None, nested);
        tree
    }

    /// Remove `prefix/` from the front of every key.
    ///
    /// An empty prefix leaves the tree unchanged. Every key must start with the
    /// prefix followed by the separator.
    pub fn strip_prefix(self, prefix: &str) -> Result<Self> {
        if prefix.is_empty() {
            return Ok(self);
        }

        let mut entries = BTreeMap::new();
        for (key, value) in self.entries {
            let stripped = key
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix(SEPARATOR))
                .ok_or_else(|| ConfigError::KeyPrefixMismatch {
                    key: key.clone(),
                    prefix: prefix.to_string(),
                })?;
            entries.insert(stripped.to_string(), value);
        }
        Ok(Self { entries })
    }

    /// Expand key paths into nested mappings.
    ///
    /// Fails on empty keys, empty segments, and keys that are both a leaf and
    /// a parent of another key.
    pub fn unflatten(&self) -> Result<Map<String, Value>> {
        self.validate()?;

        let mut root = Map::new();
        for (key, value) in &self.entries {
            let segments: Vec<&str> = key.split(SEPARATOR).collect();
            let (leaf, parents) = segments
                .split_last()
                .ok_or_else(|| ConfigError::InvalidKey { key: key.clone() })?;

            let mut node = &mut root;
            for segment in parents {
                node = node
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()))
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::KeyCollision { key: key.clone() })?;
            }
            if node.insert(leaf.to_string(), value.clone()).is_some() {
                return Err(ConfigError::KeyCollision { key: key.clone() });
            }
        }
        Ok(root)
    }

    fn validate(&self) -> Result<()> {
        for key in self.entries.keys() {
            if key.is_empty() || key.split(SEPARATOR).any(str::is_empty) {
                return Err(ConfigError::InvalidKey { key: key.clone() });
            }
            for (idx, _) in key.match_indices(SEPARATOR) {
                if self.entries.contains_key(&key[..idx]) {
                    return Err(ConfigError::KeyCollision {
                        key: key[..idx].to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for ConfigTree {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ConfigTree {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn flatten_into(
    out: &mut BTreeMap<String, Value>,
    parent: Option<&str>,
    nested: &Map<String, Value>,
) {
    for (key, value) in nested {
        let path = match parent {
            Some(parent) => format!("{}{}{}", parent, SEPARATOR, key),
            None => key.clone(),
        };
        match value {
            Value::Object(child) if !child.is_empty() => flatten_into(out, Some(&path), child),
            _ => {
                out.insert(path, value.clone());
            }
        }
    }
}

/// Replace every `{"value": ..., "metadata": {...}}` envelope with its value.
///
/// Applied depth-first, so envelopes nested inside values or lists unwrap too.
pub fn unwrap_metadata(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            if is_envelope(&map) {
                let inner = map.remove("value").unwrap_or(Value::Null);
                return unwrap_metadata(inner);
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, unwrap_metadata(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(unwrap_metadata).collect()),
        other => other,
    }
}

fn is_envelope(map: &Map<String, Value>) -> bool {
    map.len() == 2
        && map.contains_key("value")
        && matches!(map.get("metadata"), Some(Value::Object(_)))
}

/// Walk a nested mapping by a dot-separated path.
///
/// Returns `None` when a segment is missing or a non-mapping value is reached
/// before the path runs out.
pub fn lookup_dotted<'a>(root: &'a Map<String, Value>, dotted_key: &str) -> Option<&'a Value> {
    let mut segments = dotted_key.split('.');
    let first = segments.next()?;
    let mut current = root.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
