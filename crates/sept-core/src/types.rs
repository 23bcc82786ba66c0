//! Application snapshot model
//!
//! The snapshot is what the desktop shell hands to the secure exporter and
//! what it receives back on import. Only `todos` is interpreted here, and it
//! must be an array; every other key is held as raw JSON and survives a
//! round-trip exactly as written, nulls and unexpected types included.
//! Type filtering of the other collections happens at merge time.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{SeptError, SeptResult};

pub const TODOS: &str = "todos";
pub const TAB_GROUPS: &str = "tabGroups";
pub const TAB_MANAGER_GROUPS: &str = "tabManagerGroups";
pub const NOTES: &str = "notes";
pub const FOLDERS: &str = "folders";
pub const TASKBAR_ICON_ORDER: &str = "taskbarIconOrder";
pub const SETTINGS: &str = "settings";
pub const EXPORT_VERSION: &str = "exportVersion";
pub const EXPORT_DATE: &str = "exportDate";
pub const APP_VERSION: &str = "appVersion";
pub const DATA_TYPES: &str = "dataTypes";

/// Full application data snapshot
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct AppSnapshot {
    pub todos: Vec<Value>,
    /// Every key other than `todos`, untouched
    fields: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for AppSnapshot {
    type Error = SeptError;

    fn try_from(mut fields: Map<String, Value>) -> SeptResult<Self> {
        match fields.remove(TODOS) {
            Some(Value::Array(todos)) => Ok(Self { todos, fields }),
            Some(_) => Err(SeptError::Snapshot("`todos` must be an array".into())),
            None => Err(SeptError::Snapshot("missing `todos` array".into())),
        }
    }
}

impl Serialize for AppSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(TODOS, &self.todos)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl AppSnapshot {
    /// A snapshot holding only the given todos.
    pub fn with_todos(todos: Vec<Value>) -> Self {
        Self {
            todos,
            fields: Map::new(),
        }
    }

    /// Parse snapshot JSON, requiring an object with a `todos` array.
    pub fn parse_json(text: &str) -> SeptResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> SeptResult<Self> {
        match value {
            Value::Object(fields) => Self::try_from(fields),
            _ => Err(SeptError::Snapshot("snapshot must be a JSON object".into())),
        }
    }

    pub fn to_value(&self) -> SeptResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serialize to compact JSON. `todos` comes first and the remaining keys
    /// are a sorted map, so equal snapshots yield equal bytes.
    pub fn to_canonical_json(&self) -> SeptResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Raw value of a key other than `todos`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a key other than `todos`; a `todos` value must be an array.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> SeptResult<Option<Value>> {
        let key = key.into();
        if key == TODOS {
            return match value {
                Value::Array(todos) => {
                    let old = std::mem::replace(&mut self.todos, todos);
                    Ok(Some(Value::Array(old)))
                }
                _ => Err(SeptError::Snapshot("`todos` must be an array".into())),
            };
        }
        Ok(self.fields.insert(key, value))
    }

    /// All keys other than `todos`.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Split into the todos and every other key.
    pub fn into_parts(self) -> (Vec<Value>, Map<String, Value>) {
        (self.todos, self.fields)
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// The value at `key` if it is an array; anything else counts as absent.
    pub fn collection(&self, key: &str) -> Option<&Vec<Value>> {
        self.fields.get(key).and_then(Value::as_array)
    }

    /// The value at `key` if it is a non-empty string.
    pub fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn export_date(&self) -> Option<&str> {
        self.non_empty_str(EXPORT_DATE)
    }

    pub fn app_version(&self) -> Option<&str> {
        self.non_empty_str(APP_VERSION)
    }

    /// Stamp export metadata: the export date only when no usable one is
    /// present, the app version always.
    pub fn stamp_export_metadata(&mut self, export_date: impl FnOnce() -> String, app_version: &str) {
        if self.export_date().is_none() {
            self.fields
                .insert(EXPORT_DATE.to_string(), Value::String(export_date()));
        }
        self.fields
            .insert(APP_VERSION.to_string(), Value::String(app_version.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_snapshot_parses() {
        let snap =
            AppSnapshot::parse_json(r#"{"todos":[{"id":1,"text":"buy milk","completed":false}]}"#)
                .unwrap();
        assert_eq!(snap.todos.len(), 1);
        assert!(snap.get(NOTES).is_none());
        assert!(snap.fields().is_empty());
    }

    #[test]
    fn missing_todos_rejected() {
        let err = AppSnapshot::parse_json(r#"{"notes":[]}"#).unwrap_err();
        assert!(matches!(err, SeptError::Snapshot(_)));
    }

    #[test]
    fn non_array_todos_rejected() {
        let err = AppSnapshot::parse_json(r#"{"todos":{"id":1}}"#).unwrap_err();
        assert!(matches!(err, SeptError::Snapshot(_)));
        let err = AppSnapshot::parse_json(r#"{"todos":null}"#).unwrap_err();
        assert!(matches!(err, SeptError::Snapshot(_)));
    }

    #[test]
    fn non_object_rejected() {
        assert!(AppSnapshot::parse_json("[1,2,3]").is_err());
        assert!(AppSnapshot::parse_json("\"todos\"").is_err());
    }

    #[test]
    fn nulls_and_odd_types_pass_through() {
        let input = json!({
            "todos": [],
            "notes": null,
            "folders": {"a": 1},
            "taskbarIconOrder": ["todo", 3, null],
            "calendarEvents": [{"day": 3}],
            "settings": {
                "isBgmMuted": null,
                "hasSeenTutorial": true,
                "selectedTheme": "amber",
                "fontScale": 1.5
            }
        });
        let snap = AppSnapshot::from_value(input.clone()).unwrap();
        assert_eq!(snap.get(NOTES), Some(&Value::Null));
        assert!(snap.collection(FOLDERS).is_none());

        assert_eq!(snap.to_value().unwrap(), input);
        let reparsed = AppSnapshot::parse_json(&snap.to_canonical_json().unwrap()).unwrap();
        assert_eq!(reparsed, snap);
    }

    #[test]
    fn insert_guards_todos() {
        let mut snap = AppSnapshot::default();
        assert!(snap.insert(TODOS, json!({})).is_err());
        snap.insert(TODOS, json!([{"id": 1}])).unwrap();
        assert_eq!(snap.todos.len(), 1);
        assert_eq!(snap.insert("theme", json!("amber")).unwrap(), None);
        assert_eq!(snap.get("theme"), Some(&json!("amber")));
    }

    #[test]
    fn canonical_json_puts_todos_first() {
        let snap = AppSnapshot::from_value(json!({
            "zeta": 1,
            "todos": [{"id": 1}],
            "alpha": 2
        }))
        .unwrap();
        assert_eq!(
            snap.to_canonical_json().unwrap(),
            r#"{"todos":[{"id":1}],"alpha":2,"zeta":1}"#
        );
    }

    #[test]
    fn stamp_keeps_existing_date() {
        let mut snap = AppSnapshot::default();
        snap.insert(EXPORT_DATE, json!("2020-01-01T00:00:00.000Z")).unwrap();
        snap.stamp_export_metadata(|| "later".into(), "1.0.0");
        assert_eq!(snap.export_date(), Some("2020-01-01T00:00:00.000Z"));
        assert_eq!(snap.app_version(), Some("1.0.0"));

        let mut snap = AppSnapshot::default();
        snap.insert(EXPORT_DATE, Value::Null).unwrap();
        snap.stamp_export_metadata(|| "now".into(), "1.0.0");
        assert_eq!(snap.export_date(), Some("now"));
    }
}
