//! Merging an imported snapshot into live application data
//!
//! Imported todos are appended with fresh ids so they never collide with
//! existing ones; the other collections are replaced wholesale. Callers must
//! only reach this after an import has passed every verification step.
//!
//! The snapshot carries raw JSON, so type filtering happens here: a known
//! collection is taken only when it is an array, and settings only when they
//! form an object.

use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::types::{
    AppSnapshot, APP_VERSION, DATA_TYPES, EXPORT_DATE, EXPORT_VERSION, FOLDERS, NOTES, SETTINGS,
    TAB_GROUPS, TAB_MANAGER_GROUPS, TASKBAR_ICON_ORDER,
};

/// String-valued settings copied only when non-empty
const STRING_SETTINGS: [&str; 4] = ["hasSeenTutorial", "isBgmMuted", "isSfxMuted", "selectedTheme"];
const USER_PREFERENCES: &str = "userPreferences";

/// Export metadata describes the file, not the user's data
const METADATA_KEYS: [&str; 4] = [EXPORT_VERSION, EXPORT_DATE, APP_VERSION, DATA_TYPES];

/// Per-category counts reported back to the user after an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub todos: usize,
    pub bookmarks: usize,
    pub tabs: usize,
    pub notes: usize,
    pub folders: usize,
    pub settings: usize,
}

impl ImportSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Human-readable summary line.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            (self.todos, "todos"),
            (self.bookmarks, "bookmark groups"),
            (self.tabs, "tab groups"),
            (self.notes, "notes"),
            (self.folders, "folders"),
            (self.settings, "settings"),
        ]
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();

        if parts.is_empty() {
            "Import completed! No data found to import.".to_string()
        } else {
            format!("Successfully imported: {}", parts.join(", "))
        }
    }
}

/// A todo is accepted only with a numeric `id`, string `text` and boolean
/// `completed`.
fn is_valid_todo(todo: &Value) -> bool {
    todo.get("id").is_some_and(Value::is_number)
        && todo.get("text").is_some_and(Value::is_string)
        && todo.get("completed").is_some_and(Value::is_boolean)
}

/// Numeric value of an id, clamped into `0..=i64::MAX`. Ids above `i64::MAX`
/// and fractional ids are rounded up so nothing appended can collide.
fn id_floor(id: &Value) -> Option<i64> {
    if let Some(n) = id.as_i64() {
        return Some(n.max(0));
    }
    if id.as_u64().is_some() {
        return Some(i64::MAX);
    }
    let f = id.as_f64()?.ceil();
    if f >= i64::MAX as f64 {
        Some(i64::MAX)
    } else if f > 0.0 {
        Some(f as i64)
    } else {
        Some(0)
    }
}

fn max_todo_id(todos: &[Value]) -> i64 {
    todos
        .iter()
        .filter_map(|t| t.get("id").and_then(id_floor))
        .max()
        .unwrap_or(0)
}

/// Append valid imported todos to `existing`, renumbering them after the
/// current highest id. Returns how many were appended.
///
/// Once the id space is exhausted the remaining todos are dropped.
pub fn merge_todos(existing: &mut Vec<Value>, imported: Vec<Value>) -> usize {
    let base = max_todo_id(existing);
    let mut next = base.checked_add(1);
    let mut added = 0;
    let mut dropped = 0;

    for mut todo in imported.into_iter().filter(is_valid_todo) {
        let Some(id) = next else {
            dropped += 1;
            continue;
        };
        if let Some(obj) = todo.as_object_mut() {
            obj.insert("id".to_string(), Value::Number(Number::from(id)));
        }
        existing.push(todo);
        added += 1;
        next = id.checked_add(1);
    }

    if dropped > 0 {
        warn!(dropped, max_id = base, "todo id space exhausted, skipping remaining todos");
    }
    tracing::debug!(added, after_id = base, "merged imported todos");
    added
}

fn merge_settings(store: &mut Map<String, Value>, imported: Map<String, Value>) -> usize {
    let slot = store
        .entry(SETTINGS)
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    let Some(target) = slot.as_object_mut() else {
        return 0;
    };

    let mut count = 0;
    for (key, value) in imported {
        let accepted = if STRING_SETTINGS.contains(&key.as_str()) {
            value.as_str().is_some_and(|s| !s.is_empty())
        } else if key == USER_PREFERENCES {
            value.is_object()
        } else {
            target.insert(key, value);
            continue;
        };
        if accepted {
            target.insert(key, value);
            count += 1;
        }
    }
    count
}

/// Replace `key` when `value` is an array, returning its length.
fn replace_collection(fields: &mut Map<String, Value>, key: &str, value: Value) -> usize {
    match value {
        Value::Array(items) => {
            let n = items.len();
            fields.insert(key.to_string(), Value::Array(items));
            n
        }
        _ => 0,
    }
}

/// Apply a verified imported snapshot to the live store.
pub fn apply_snapshot(store: &mut AppSnapshot, imported: AppSnapshot) -> ImportSummary {
    let (todos, fields) = imported.into_parts();
    let mut summary = ImportSummary {
        todos: merge_todos(&mut store.todos, todos),
        ..ImportSummary::default()
    };

    let target = store.fields_mut();
    for (key, value) in fields {
        match key.as_str() {
            TAB_GROUPS => summary.bookmarks = replace_collection(target, &key, value),
            TAB_MANAGER_GROUPS => summary.tabs = replace_collection(target, &key, value),
            NOTES => summary.notes = replace_collection(target, &key, value),
            FOLDERS => summary.folders = replace_collection(target, &key, value),
            TASKBAR_ICON_ORDER => {
                replace_collection(target, &key, value);
            }
            SETTINGS => {
                if let Value::Object(settings) = value {
                    summary.settings = merge_settings(target, settings);
                }
            }
            k if METADATA_KEYS.contains(&k) => {}
            _ => {
                target.insert(key.clone(), value);
            }
        }
    }

    summary
}
