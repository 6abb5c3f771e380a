//! Results returned by statement execution.

use crate::{
    error::{Error, Result},
    DocumentId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One document returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryResultItem {
    value: Value,
}

impl QueryResultItem {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// The document as a JSON value, `_id` included.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The document serialized as a compact JSON string.
    pub fn json_string(&self) -> String {
        self.value.to_string()
    }

    /// Decode the document into a typed value.
    pub fn deserialize_value<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.value).map_err(|e| Error::InvalidDocument(e.to_string()))
    }
}

/// Outcome of executing a statement.
///
/// Reads fill `items`; writes fill `mutated_document_ids` with the ids of the
/// documents they touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub items: Vec<QueryResultItem>,
    pub mutated_document_ids: Vec<DocumentId>,
}

impl QueryResult {
    pub fn from_items(items: Vec<QueryResultItem>) -> Self {
        Self {
            items,
            mutated_document_ids: Vec::new(),
        }
    }

    pub fn from_mutations(mutated_document_ids: Vec<DocumentId>) -> Self {
        Self {
            items: Vec::new(),
            mutated_document_ids,
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn get_item(&self, index: usize) -> Option<&QueryResultItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryResultItem> {
        self.items.iter()
    }

    /// Diagnostic rendering: each item as its JSON string, plus the ids of
    /// mutated documents.
    pub fn to_json(&self) -> Value {
        json!({
            "items": self.items.iter().map(QueryResultItem::json_string).collect::<Vec<_>>(),
            "modified_document_ids": self.mutated_document_ids,
        })
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a QueryResultItem;
    type IntoIter = std::slice::Iter<'a, QueryResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(rename = "_id")]
        id: String,
        title: String,
    }

    #[test]
    fn diagnostic_json() {
        let result = QueryResult {
            items: vec![QueryResultItem::new(json!({"_id": "a", "title": "x"}))],
            mutated_document_ids: vec!["a".into()],
        };
        let rendered = result.to_json();
        assert_eq!(rendered["modified_document_ids"], json!(["a"]));
        let item: Value =
            serde_json::from_str(rendered["items"][0].as_str().unwrap()).unwrap();
        assert_eq!(item, json!({"_id": "a", "title": "x"}));
    }

    #[test]
    fn typed_items() {
        let item = QueryResultItem::new(json!({"_id": "a", "title": "x"}));
        let row: Row = item.deserialize_value().unwrap();
        assert_eq!(
            row,
            Row {
                id: "a".into(),
                title: "x".into()
            }
        );

        let bad = QueryResultItem::new(json!({"_id": 5}));
        assert!(matches!(
            bad.deserialize_value::<Row>(),
            Err(Error::InvalidDocument(_))
        ));
    }
}
