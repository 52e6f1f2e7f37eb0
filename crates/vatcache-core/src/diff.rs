//! Structural diff between two JSON documents.
//!
//! `compare` walks both trees together and tags every leaf as created,
//! updated, deleted or unchanged. A side that is missing entirely is treated
//! as a leaf, so a whole new entity shows up as a single `Created` leaf
//! carrying the entity itself. Arrays are compared by position.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::DateTime;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Created,
    Updated,
    Deleted,
    Unchanged,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Created => write!(f, "created"),
            Classification::Updated => write!(f, "updated"),
            Classification::Deleted => write!(f, "deleted"),
            Classification::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiffNode {
    /// `value` is the old value when there is one, otherwise the new one.
    Leaf {
        classification: Classification,
        value: Value,
    },
    /// Both sides were containers of the same kind.
    Node {
        classification: Classification,
        children: BTreeMap<String, DiffNode>,
    },
}

impl DiffNode {
    pub fn classification(&self) -> Classification {
        match self {
            DiffNode::Leaf { classification, .. } | DiffNode::Node { classification, .. } => {
                *classification
            }
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            DiffNode::Leaf { value, .. } => Some(value),
            DiffNode::Node { .. } => None,
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<String, DiffNode>> {
        match self {
            DiffNode::Node { children, .. } => Some(children),
            DiffNode::Leaf { .. } => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DiffNode> {
        self.children().and_then(|c| c.get(key))
    }

    /// Paths (`/`-separated) and values of every leaf with the given tag.
    pub fn collect(&self, classification: Classification) -> Vec<(String, &Value)> {
        let mut out = Vec::new();
        self.collect_into(String::new(), classification, &mut out);
        out
    }

    fn collect_into<'a>(
        &'a self,
        path: String,
        classification: Classification,
        out: &mut Vec<(String, &'a Value)>,
    ) {
        match self {
            DiffNode::Leaf { classification: c, value } => {
                if *c == classification {
                    out.push((path, value));
                }
            }
            DiffNode::Node { children, .. } => {
                for (key, child) in children {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}/{}", path, key)
                    };
                    child.collect_into(child_path, classification, out);
                }
            }
        }
    }
}

/// Compare two optional values. `None` means the value is absent on that side.
pub fn compare(old: Option<&Value>, new: Option<&Value>) -> DiffNode {
    compare_with(old, new, &|_, _| false)
}

/// Like `compare`, but members for which `skip(key, value)` holds on either
/// side are left out of the result entirely.
pub fn compare_with(
    old: Option<&Value>,
    new: Option<&Value>,
    skip: &dyn Fn(&str, &Value) -> bool,
) -> DiffNode {
    match (old, new) {
        (Some(Value::Object(a)), Some(Value::Object(b))) => compare_objects(a, b, skip),
        (Some(Value::Array(a)), Some(Value::Array(b))) => {
            compare_objects(&index_array(a), &index_array(b), skip)
        }
        _ => DiffNode::Leaf {
            classification: classify_values(old, new),
            value: old.or(new).cloned().unwrap_or(Value::Null),
        },
    }
}

fn compare_objects(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    skip: &dyn Fn(&str, &Value) -> bool,
) -> DiffNode {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    let mut children = BTreeMap::new();

    for key in keys {
        let a = old.get(key);
        let b = new.get(key);
        if a.is_some_and(|v| skip(key, v)) || b.is_some_and(|v| skip(key, v)) {
            continue;
        }
        children.insert(key.clone(), compare_with(a, b, skip));
    }

    let classification = if children
        .values()
        .all(|c| c.classification() == Classification::Unchanged)
    {
        Classification::Unchanged
    } else {
        Classification::Updated
    };

    DiffNode::Node {
        classification,
        children,
    }
}

fn index_array(items: &[Value]) -> Map<String, Value> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| (i.to_string(), v.clone()))
        .collect()
}

fn classify_values(old: Option<&Value>, new: Option<&Value>) -> Classification {
    match (old, new) {
        (None, None) => Classification::Unchanged,
        (None, Some(_)) => Classification::Created,
        (Some(_), None) => Classification::Deleted,
        (Some(a), Some(b)) if values_equal(a, b) => Classification::Unchanged,
        (Some(_), Some(_)) => Classification::Updated,
    }
}

/// Leaf equality. Numbers compare by value and RFC 3339 timestamps by
/// instant, so `1` equals `1.0` and `...Z` equals `...+00:00`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::String(x), Value::String(y)) => {
            if x == y {
                return true;
            }
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x == y,
                _ => false,
            }
        }
        _ => a == b,
    }
}

// ============================================================================
// Entity lists
// ============================================================================

/// Stable key for a client entry: its callsign, or its list position when it
/// has none. Callsigns are unique per connection on the network.
fn entity_key(entry: &Value, index: usize) -> String {
    match entry.get("callsign").and_then(Value::as_str) {
        Some(callsign) if !callsign.is_empty() => callsign.to_string(),
        _ => format!("#{}", index),
    }
}

/// Repeated keys are numbered by occurrence (`DUP`, `DUP#2`, ...) so a
/// duplicate keeps its key when unrelated entries shift around it.
fn keyed(entries: &[Value]) -> (Vec<String>, Map<String, Value>) {
    let mut keys = Vec::with_capacity(entries.len());
    let mut map = Map::new();
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        let base = entity_key(entry, i);
        let seen = occurrences.entry(base.clone()).or_insert(0);
        *seen += 1;
        let key = if *seen == 1 {
            base
        } else {
            format!("{}#{}", base, seen)
        };
        map.insert(key.clone(), entry.clone());
        keys.push(key);
    }
    (keys, map)
}

/// Diff two client lists keyed by callsign instead of position, so one
/// disconnect does not shift every later entry.
pub fn diff_entities(old: &[Value], new: &[Value]) -> BTreeMap<String, DiffNode> {
    let (_, old_map) = keyed(old);
    let (_, new_map) = keyed(new);
    match compare_objects(&old_map, &new_map, &|_, _| false) {
        DiffNode::Node { children, .. } => children,
        DiffNode::Leaf { .. } => BTreeMap::new(),
    }
}

/// Entries of `new` that have no counterpart in `old`, in feed order.
pub fn created_entities(old: &[Value], new: &[Value]) -> Vec<Value> {
    let diff = diff_entities(old, new);
    let (keys, _) = keyed(new);
    keys.iter()
        .zip(new)
        .filter(|(key, _)| {
            diff.get(key.as_str())
                .is_some_and(|node| node.classification() == Classification::Created)
        })
        .map(|(_, entry)| entry.clone())
        .collect()
}
