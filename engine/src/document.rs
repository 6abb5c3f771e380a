//! Documents held by the store.

use crate::{
    error::{Error, Result},
    DocumentId, LogicalClock, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the reserved identifier field.
pub const ID_FIELD: &str = "_id";

/// Generate a fresh document id (32 lowercase hex digits).
pub fn new_document_id() -> DocumentId {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Bookkeeping attached to each document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// When the document was inserted (milliseconds since epoch)
    pub created_at: Timestamp,
    /// When the document was last written (milliseconds since epoch)
    pub updated_at: Timestamp,
    /// Store clock at the time of the last write
    pub clock: LogicalClock,
}

impl Metadata {
    pub fn new(timestamp: Timestamp, clock: LogicalClock) -> Self {
        Self {
            created_at: timestamp,
            updated_at: timestamp,
            clock,
        }
    }

    pub fn touch(&mut self, timestamp: Timestamp, clock: LogicalClock) {
        self.updated_at = timestamp;
        self.clock = clock;
    }
}

/// A schemaless document. The `_id` is kept apart from the other fields so
/// that no write can change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub fields: Map<String, Value>,
    pub metadata: Metadata,
}

impl Document {
    /// Create a document. Any `_id` key inside `fields` is discarded.
    pub fn new(
        id: impl Into<DocumentId>,
        mut fields: Map<String, Value>,
        timestamp: Timestamp,
        clock: LogicalClock,
    ) -> Self {
        fields.remove(ID_FIELD);
        Self {
            id: id.into(),
            fields,
            metadata: Metadata::new(timestamp, clock),
        }
    }

    /// Resolve a dotted field path. Missing fields resolve to `null`.
    pub fn get_path(&self, path: &[String]) -> Value {
        match path.split_first() {
            None => Value::Null,
            Some((head, [])) if head == ID_FIELD => Value::String(self.id.clone()),
            Some((head, rest)) => {
                let mut current = match self.fields.get(head) {
                    Some(value) => value,
                    None => return Value::Null,
                };
                for segment in rest {
                    current = match child(current, segment) {
                        Some(value) => value,
                        None => return Value::Null,
                    };
                }
                current.clone()
            }
        }
    }

    /// Assign a value at a dotted field path, creating intermediate objects.
    pub fn set_path(&mut self, path: &[String], value: Value) -> Result<()> {
        if path.first().map(String::as_str) == Some(ID_FIELD) {
            return Err(Error::ImmutableId(self.id.clone()));
        }
        set_in(&mut self.fields, path, value)
    }

    /// Overwrite top-level fields with the ones given.
    pub fn merge_fields(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            if key != ID_FIELD {
                self.fields.insert(key, value);
            }
        }
    }

    /// Record a write.
    pub fn touch(&mut self, timestamp: Timestamp, clock: LogicalClock) {
        self.metadata.touch(timestamp, clock);
    }

    /// The document as a JSON object including `_id`.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        Value::Object(object)
    }
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn set_in(map: &mut Map<String, Value>, path: &[String], value: Value) -> Result<()> {
    let (head, rest) = path
        .split_first()
        .ok_or_else(|| Error::InvalidDocument("empty field path".into()))?;

    if rest.is_empty() {
        map.insert(head.clone(), value);
        return Ok(());
    }

    let entry = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if entry.is_null() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(inner) => set_in(inner, rest, value),
        other => Err(Error::Type(format!(
            "field '{}' is {}, not an object",
            head,
            type_name(other)
        ))),
    }
}

/// Short type name of a JSON value, for error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn path(s: &str) -> Vec<String> {
        s.split('.').map(str::to_string).collect()
    }

    fn doc(value: Value) -> Document {
        Document::new(
            "doc-1",
            fields(value),
            1000,
            LogicalClock::with_counter("peer", 1),
        )
    }

    #[test]
    fn id_is_split_from_fields() {
        let doc = doc(json!({"_id": "ignored", "title": "Buy milk"}));
        assert_eq!(doc.id, "doc-1");
        assert!(!doc.fields.contains_key(ID_FIELD));
        assert_eq!(doc.to_value(), json!({"_id": "doc-1", "title": "Buy milk"}));
    }

    #[test]
    fn get_nested_and_missing_paths() {
        let doc = doc(json!({"meta": {"tags": ["a", "b"]}}));
        assert_eq!(doc.get_path(&path("_id")), json!("doc-1"));
        assert_eq!(doc.get_path(&path("meta.tags.1")), json!("b"));
        assert_eq!(doc.get_path(&path("meta.missing")), Value::Null);
        assert_eq!(doc.get_path(&path("nope.deeper")), Value::Null);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = doc(json!({"title": "x"}));
        doc.set_path(&path("meta.priority"), json!(3)).unwrap();
        assert_eq!(doc.get_path(&path("meta.priority")), json!(3));
    }

    #[test]
    fn set_through_scalar_fails() {
        let mut doc = doc(json!({"title": "x"}));
        let err = doc.set_path(&path("title.sub"), json!(1)).unwrap_err();
        assert!(matches!(err, Error::Type(_)));
    }

    #[test]
    fn id_cannot_be_assigned() {
        let mut doc = doc(json!({}));
        let err = doc.set_path(&path("_id"), json!("other")).unwrap_err();
        assert_eq!(err, Error::ImmutableId("doc-1".into()));
    }

    #[test]
    fn generated_ids_are_hex_and_unique() {
        let a = new_document_id();
        let b = new_document_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
