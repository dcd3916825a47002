use serde::Serialize;
use serde_json::{Map, Value};
use similar::TextDiff;
use tlg_types::Payload;

/// The changes needed to turn one payload into another, in path order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PayloadDiff {
    pub changes: Vec<FieldChange>,
}

impl PayloadDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn additions(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FieldChange::Added { .. }))
            .count()
    }

    pub fn removals(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FieldChange::Removed { .. }))
            .count()
    }

    pub fn modifications(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FieldChange::Modified { .. }))
            .count()
    }

    /// Look up the change recorded at an exact path.
    pub fn at(&self, path: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.path() == path)
    }
}

/// A single changed field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldChange {
    Added {
        path: String,
        value: Value,
    },
    Removed {
        path: String,
        value: Value,
    },
    Modified {
        path: String,
        old: Value,
        new: Value,
        /// Character-level similarity in `[0, 1]`, only for string leaves.
        #[serde(skip_serializing_if = "Option::is_none")]
        similarity: Option<f32>,
    },
}

impl FieldChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Modified { path, .. } => {
                path
            }
        }
    }
}

/// Diff two payloads.
pub fn diff_payloads(old: &Payload, new: &Payload) -> PayloadDiff {
    diff_values(&old.to_value(), &new.to_value())
}

/// Diff two arbitrary JSON values. A non-object root is compared as the
/// single path `""`.
pub fn diff_values(old: &Value, new: &Value) -> PayloadDiff {
    let mut changes = Vec::new();
    walk("", old, new, &mut changes);
    PayloadDiff { changes }
}

fn walk(path: &str, old: &Value, new: &Value, out: &mut Vec<FieldChange>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => walk_object(path, a, b, out),
        (Value::Array(a), Value::Array(b)) => {
            for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                walk(&index_path(path, i), x, y, out);
            }
            for (i, value) in a.iter().enumerate().skip(b.len()) {
                out.push(FieldChange::Removed {
                    path: index_path(path, i),
                    value: value.clone(),
                });
            }
            for (i, value) in b.iter().enumerate().skip(a.len()) {
                out.push(FieldChange::Added {
                    path: index_path(path, i),
                    value: value.clone(),
                });
            }
        }
        _ if old == new => {}
        _ => out.push(FieldChange::Modified {
            path: path.to_string(),
            old: old.clone(),
            new: new.clone(),
            similarity: text_similarity(old, new),
        }),
    }
}

fn walk_object(
    path: &str,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    out: &mut Vec<FieldChange>,
) {
    let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let child = key_path(path, key);
        match (old.get(key), new.get(key)) {
            (Some(a), Some(b)) => walk(&child, a, b, out),
            (Some(a), None) => out.push(FieldChange::Removed {
                path: child,
                value: a.clone(),
            }),
            (None, Some(b)) => out.push(FieldChange::Added {
                path: child,
                value: b.clone(),
            }),
            (None, None) => {}
        }
    }
}

fn key_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

fn text_similarity(old: &Value, new: &Value) -> Option<f32> {
    match (old, new) {
        (Value::String(a), Value::String(b)) => {
            Some(TextDiff::from_chars(a.as_str(), b.as_str()).ratio())
        }
        _ => None,
    }
}
