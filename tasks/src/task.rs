//! The task entity.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One to-do item as stored in the `tasks` collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    /// Assigned by the store on insert; empty for a task not yet added.
    #[serde(
        rename = "_id",
        default,
        skip_serializing_if = "String::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub done: bool,
    /// Soft-delete flag
    #[serde(default, deserialize_with = "null_as_default")]
    pub deleted: bool,
}

impl Task {
    pub fn new(title: impl Into<String>, done: bool) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            done,
            deleted: false,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let check = if self.done { 'x' } else { ' ' };
        write!(f, "[{}] {} ({})", check, self.title, self.id)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_task_has_no_id() {
        let task = Task::new("Buy milk", false);
        assert!(task.id.is_empty());
        assert!(!task.deleted);
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({"title": "Buy milk", "done": false, "deleted": false})
        );
    }

    #[test]
    fn decodes_stored_documents() {
        let task =
            Task::from_json(r#"{"_id":"abc","title":"Walk","done":true,"deleted":false}"#).unwrap();
        assert_eq!(
            task,
            Task {
                id: "abc".into(),
                title: "Walk".into(),
                done: true,
                deleted: false,
            }
        );
    }

    #[test]
    fn missing_and_null_fields_use_defaults() {
        let task = Task::from_json(r#"{"_id":"abc","title":null}"#).unwrap();
        assert_eq!(task.title, "");
        assert!(!task.done);
        assert!(!task.deleted);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let task = Task::from_json(r#"{"_id":"abc","title":"x","priority":3}"#).unwrap();
        assert_eq!(task.title, "x");
    }

    #[test]
    fn json_round_trip_keeps_id() {
        let mut task = Task::new("Read", true);
        task.id = "id-1".into();
        assert_eq!(Task::from_json(&task.to_json().unwrap()).unwrap(), task);
    }

    #[test]
    fn display() {
        let mut task = Task::new("Read", true);
        task.id = "id-1".into();
        assert_eq!(task.to_string(), "[x] Read (id-1)");
        task.done = false;
        assert_eq!(task.to_string(), "[ ] Read (id-1)");
    }
}
