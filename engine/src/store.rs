//! Store - the in-memory document container.
//!
//! The store owns every collection and executes parsed statements against
//! them. It does no IO and no locking; the [`Engine`](crate::Engine) wraps it
//! in a mutex and persists snapshots.

use crate::{
    document::{new_document_id, type_name, ID_FIELD},
    dql::{
        compare_values, evaluate, matches, ConflictPolicy, Evict, Insert, Select, Statement,
        Update,
    },
    error::{Error, Result},
    snapshot::StoreSnapshot,
    CollectionName, Document, DocumentId, LogicalClock, PeerId, QueryResult, QueryResultItem,
    Timestamp,
};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Upper bound on the number of items a single `SELECT` returns.
pub const QUERY_RESULT_CAP: usize = 1000;

/// A collection of documents, kept ordered by id.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    documents: BTreeMap<DocumentId, Document>,
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a document by id.
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// All documents in id order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// The main store holding all state.
#[derive(Debug, Clone)]
pub struct Store {
    peer_id: PeerId,
    clock: LogicalClock,
    collections: HashMap<CollectionName, Collection>,
    settings: BTreeMap<String, Value>,
}

impl Store {
    /// Create an empty store owned by `peer_id`.
    pub fn new(peer_id: impl Into<PeerId>) -> Self {
        let peer_id = peer_id.into();
        Self {
            clock: LogicalClock::new(peer_id.clone()),
            peer_id,
            collections: HashMap::new(),
            settings: BTreeMap::new(),
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    /// A value recorded with `ALTER SYSTEM SET`.
    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(&name.to_ascii_uppercase())
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Get a document by collection and id.
    pub fn get(&self, collection: &str, id: &str) -> Option<&Document> {
        self.collections.get(collection).and_then(|c| c.get(id))
    }

    fn next_clock(&mut self) -> LogicalClock {
        self.clock.tick().clone()
    }

    /// Execute a parsed statement.
    ///
    /// A failing statement leaves the store unchanged.
    pub fn execute(
        &mut self,
        statement: &Statement,
        params: &Map<String, Value>,
        timestamp: Timestamp,
    ) -> Result<QueryResult> {
        match statement {
            Statement::Select(select) => self.select(select, params),
            Statement::Insert(insert) => self.insert(insert, params, timestamp),
            Statement::Update(update) => self.update(update, params, timestamp),
            Statement::Evict(evict) => self.evict(evict, params),
            Statement::AlterSystem { name, value } => {
                tracing::debug!(setting = %name, value = %value, "system setting changed");
                self.settings.insert(name.clone(), value.clone());
                Ok(QueryResult::default())
            }
        }
    }

    /// Run a `SELECT`. Unknown collections yield an empty result.
    pub fn select(&self, select: &Select, params: &Map<String, Value>) -> Result<QueryResult> {
        let Some(collection) = self.collections.get(&select.collection) else {
            return Ok(QueryResult::default());
        };

        let mut matched = Vec::new();
        for doc in collection.documents() {
            if let Some(filter) = &select.filter {
                if !matches(filter, doc, params)? {
                    continue;
                }
            }
            matched.push(doc);
        }

        if !select.order_by.is_empty() {
            matched.sort_by(|a, b| {
                for key in &select.order_by {
                    let ordering = compare_values(&a.get_path(&key.path), &b.get_path(&key.path));
                    let ordering = if key.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let limit = select
            .limit
            .unwrap_or(QUERY_RESULT_CAP)
            .min(QUERY_RESULT_CAP);
        let items = matched
            .into_iter()
            .skip(select.offset.unwrap_or(0))
            .take(limit)
            .map(|doc| QueryResultItem::new(doc.to_value()))
            .collect();

        Ok(QueryResult::from_items(items))
    }

    fn insert(
        &mut self,
        insert: &Insert,
        params: &Map<String, Value>,
        timestamp: Timestamp,
    ) -> Result<QueryResult> {
        let existing = self.collections.get(&insert.collection);

        // Validate the whole batch before writing anything.
        let mut batch: Vec<(DocumentId, Map<String, Value>)> = Vec::new();
        for expr in &insert.documents {
            let mut fields = match evaluate(expr, None, params)? {
                Value::Object(fields) => fields,
                other => {
                    return Err(Error::InvalidDocument(format!(
                        "INSERT expects an object, got {}",
                        type_name(&other)
                    )))
                }
            };
            let id = match fields.remove(ID_FIELD) {
                None | Some(Value::Null) => new_document_id(),
                Some(Value::String(id)) if !id.is_empty() => id,
                Some(other) => {
                    return Err(Error::InvalidDocument(format!(
                        "_id must be a non-empty string, got {}",
                        type_name(&other)
                    )))
                }
            };

            let stored = existing.is_some_and(|c| c.get(&id).is_some());
            let queued = batch.iter().position(|(queued, _)| *queued == id);
            match (insert.on_conflict, stored || queued.is_some()) {
                (_, false) => batch.push((id, fields)),
                (ConflictPolicy::Fail, true) => return Err(Error::DuplicateId(id)),
                (ConflictPolicy::DoNothing, true) => {}
                (ConflictPolicy::Update, true) => match queued {
                    Some(index) => batch[index].1.extend(fields),
                    None => batch.push((id, fields)),
                },
            }
        }

        let clock = self.next_clock();
        let collection = self
            .collections
            .entry(insert.collection.clone())
            .or_default();

        let mut mutated = Vec::with_capacity(batch.len());
        for (id, fields) in batch {
            match collection.documents.get_mut(&id) {
                Some(doc) if insert.on_conflict == ConflictPolicy::Update => {
                    doc.merge_fields(fields);
                    doc.touch(timestamp, clock.clone());
                }
                Some(_) => continue,
                None => {
                    let doc = Document::new(id.clone(), fields, timestamp, clock.clone());
                    collection.documents.insert(id.clone(), doc);
                }
            }
            mutated.push(id);
        }

        tracing::trace!(collection = %insert.collection, count = mutated.len(), "inserted documents");
        Ok(QueryResult::from_mutations(mutated))
    }

    fn update(
        &mut self,
        update: &Update,
        params: &Map<String, Value>,
        timestamp: Timestamp,
    ) -> Result<QueryResult> {
        let Some(collection) = self.collections.get(&update.collection) else {
            return Ok(QueryResult::default());
        };

        let mut changed = Vec::new();
        for doc in collection.documents() {
            if let Some(filter) = &update.filter {
                if !matches(filter, doc, params)? {
                    continue;
                }
            }
            let mut next = doc.clone();
            for (path, expr) in &update.assignments {
                let value = evaluate(expr, Some(doc), params)?;
                next.set_path(path, value)?;
            }
            changed.push(next);
        }

        if changed.is_empty() {
            return Ok(QueryResult::default());
        }

        let clock = self.next_clock();
        let mut mutated = Vec::with_capacity(changed.len());
        if let Some(collection) = self.collections.get_mut(&update.collection) {
            for mut doc in changed {
                doc.touch(timestamp, clock.clone());
                mutated.push(doc.id.clone());
                collection.documents.insert(doc.id.clone(), doc);
            }
        }

        Ok(QueryResult::from_mutations(mutated))
    }

    fn evict(&mut self, evict: &Evict, params: &Map<String, Value>) -> Result<QueryResult> {
        let Some(collection) = self.collections.get(&evict.collection) else {
            return Ok(QueryResult::default());
        };

        let mut evicted = Vec::new();
        for doc in collection.documents() {
            let hit = match &evict.filter {
                Some(filter) => matches(filter, doc, params)?,
                None => true,
            };
            if hit {
                evicted.push(doc.id.clone());
            }
        }

        if evicted.is_empty() {
            return Ok(QueryResult::default());
        }

        self.next_clock();
        if let Some(collection) = self.collections.get_mut(&evict.collection) {
            for id in &evicted {
                collection.documents.remove(id);
            }
        }

        tracing::debug!(collection = %evict.collection, count = evicted.len(), "evicted documents");
        Ok(QueryResult::from_mutations(evicted))
    }

    /// Export the current store state as a snapshot.
    pub fn export_state(&self) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::new(self.peer_id.clone());
        snapshot.clock = self.clock.clone();
        snapshot.settings = self.settings.clone();

        for (name, collection) in &self.collections {
            for doc in collection.documents() {
                snapshot.add_document(name.clone(), doc.clone());
            }
        }

        snapshot
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let collections = snapshot
            .collections
            .into_iter()
            .map(|(name, documents)| (name, Collection { documents }))
            .collect();

        Self {
            peer_id: snapshot.peer_id,
            clock: snapshot.clock,
            collections,
            settings: snapshot.settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dql::parse;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => panic!("params must be an object"),
        }
    }

    fn run(store: &mut Store, query: &str, args: Value) -> Result<QueryResult> {
        store.execute(&parse(query)?, &params(args), 1000)
    }

    fn ids(result: &QueryResult) -> Vec<String> {
        result
            .iter()
            .map(|item| item.value()[ID_FIELD].as_str().unwrap().to_string())
            .collect()
    }

    fn seeded() -> Store {
        let mut store = Store::new("peer-1");
        for (id, title, done) in [("b", "second", true), ("a", "first", false), ("c", "third", false)] {
            run(
                &mut store,
                "INSERT INTO tasks DOCUMENTS (:doc)",
                json!({"doc": {"_id": id, "title": title, "done": done, "deleted": false}}),
            )
            .unwrap();
        }
        store
    }

    #[test]
    fn insert_generates_ids() {
        let mut store = Store::new("peer-1");
        let result = run(
            &mut store,
            "INSERT INTO tasks DOCUMENTS (:t)",
            json!({"t": {"title": "x"}}),
        )
        .unwrap();

        assert_eq!(result.mutated_document_ids.len(), 1);
        let id = &result.mutated_document_ids[0];
        assert_eq!(id.len(), 32);
        assert_eq!(store.get("tasks", id).unwrap().fields["title"], json!("x"));
        assert_eq!(store.clock().counter, 1);
    }

    #[test]
    fn select_from_unknown_collection_is_empty() {
        let mut store = Store::new("peer-1");
        let result = run(&mut store, "SELECT * FROM nothing", Value::Null).unwrap();
        assert_eq!(result.item_count(), 0);
    }

    #[test]
    fn natural_order_is_by_id() {
        let mut store = seeded();
        let result = run(&mut store, "SELECT * FROM tasks", Value::Null).unwrap();
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
    }

    #[test]
    fn order_limit_offset() {
        let mut store = seeded();
        let result = run(
            &mut store,
            "SELECT * FROM tasks ORDER BY done DESC, title LIMIT 2 OFFSET 1",
            Value::Null,
        )
        .unwrap();
        assert_eq!(ids(&result), vec!["a", "c"]);
    }

    #[test]
    fn select_is_capped() {
        let mut store = Store::new("peer-1");
        let docs: Vec<String> = (0..QUERY_RESULT_CAP + 5)
            .map(|i| format!("({{'n': {}}})", i))
            .collect();
        run(
            &mut store,
            &format!("INSERT INTO big DOCUMENTS {}", docs.join(", ")),
            Value::Null,
        )
        .unwrap();

        let all = run(&mut store, "SELECT * FROM big", Value::Null).unwrap();
        assert_eq!(all.item_count(), QUERY_RESULT_CAP);
        let limited = run(&mut store, "SELECT * FROM big LIMIT 5000", Value::Null).unwrap();
        assert_eq!(limited.item_count(), QUERY_RESULT_CAP);
    }

    #[test]
    fn duplicate_id_fails_without_partial_write() {
        let mut store = seeded();
        let err = run(
            &mut store,
            "INSERT INTO tasks DOCUMENTS ({'_id': 'z'}), ({'_id': 'a'})",
            Value::Null,
        )
        .unwrap_err();
        assert_eq!(err, Error::DuplicateId("a".into()));
        assert!(store.get("tasks", "z").is_none());
    }

    #[test]
    fn conflict_policies() {
        let mut store = seeded();
        let nothing = run(
            &mut store,
            "INSERT INTO tasks DOCUMENTS ({'_id': 'a', 'title': 'new'}) ON ID CONFLICT DO NOTHING",
            Value::Null,
        )
        .unwrap();
        assert!(nothing.mutated_document_ids.is_empty());
        assert_eq!(store.get("tasks", "a").unwrap().fields["title"], json!("first"));

        let updated = run(
            &mut store,
            "INSERT INTO tasks DOCUMENTS ({'_id': 'a', 'title': 'new'}) ON ID CONFLICT DO UPDATE",
            Value::Null,
        )
        .unwrap();
        assert_eq!(updated.mutated_document_ids, vec!["a"]);
        let doc = store.get("tasks", "a").unwrap();
        assert_eq!(doc.fields["title"], json!("new"));
        assert_eq!(doc.fields["done"], json!(false));
    }

    #[test]
    fn insert_rejects_non_objects_and_bad_ids() {
        let mut store = Store::new("peer-1");
        let err = run(&mut store, "INSERT INTO t DOCUMENTS (:x)", json!({"x": 5})).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
        let err = run(&mut store, "INSERT INTO t DOCUMENTS ({'_id': 7})", Value::Null).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
    }

    #[test]
    fn update_reports_matched_ids() {
        let mut store = seeded();
        let result = run(
            &mut store,
            "UPDATE tasks SET done = true WHERE NOT done",
            Value::Null,
        )
        .unwrap();
        assert_eq!(result.mutated_document_ids, vec!["a", "c"]);
        assert_eq!(store.get("tasks", "c").unwrap().fields["done"], json!(true));

        let none = run(
            &mut store,
            "UPDATE tasks SET done = false WHERE _id = 'missing'",
            Value::Null,
        )
        .unwrap();
        assert!(none.mutated_document_ids.is_empty());
    }

    #[test]
    fn update_can_reference_the_document() {
        let mut store = seeded();
        run(
            &mut store,
            "UPDATE tasks SET title = upper(title), meta.seen = true WHERE _id = 'a'",
            Value::Null,
        )
        .unwrap();
        let doc = store.get("tasks", "a").unwrap();
        assert_eq!(doc.fields["title"], json!("FIRST"));
        assert_eq!(doc.fields["meta"], json!({"seen": true}));
    }

    #[test]
    fn update_cannot_change_id() {
        let mut store = seeded();
        let err = run(&mut store, "UPDATE tasks SET _id = 'x' WHERE _id = 'a'", Value::Null)
            .unwrap_err();
        assert_eq!(err, Error::ImmutableId("a".into()));
        assert!(store.get("tasks", "a").is_some());
    }

    #[test]
    fn evict_removes_documents() {
        let mut store = seeded();
        run(&mut store, "UPDATE tasks SET deleted = true WHERE _id = 'b'", Value::Null).unwrap();
        let result = run(&mut store, "EVICT FROM tasks WHERE deleted = true", Value::Null).unwrap();
        assert_eq!(result.mutated_document_ids, vec!["b"]);
        assert!(store.get("tasks", "b").is_none());
        assert_eq!(store.collection("tasks").unwrap().len(), 2);
    }

    #[test]
    fn alter_system_records_setting() {
        let mut store = Store::new("peer-1");
        run(&mut store, "ALTER SYSTEM SET DQL_STRICT_MODE = false", Value::Null).unwrap();
        assert_eq!(store.setting("dql_strict_mode"), Some(&json!(false)));
    }

    #[test]
    fn export_and_restore() {
        let mut store = seeded();
        run(&mut store, "ALTER SYSTEM SET DQL_STRICT_MODE = false", Value::Null).unwrap();
        let snapshot = store.export_state();
        assert_eq!(snapshot.document_count(), 3);

        let mut restored = Store::from_snapshot(snapshot);
        assert_eq!(restored.clock(), store.clock());
        assert_eq!(restored.setting("DQL_STRICT_MODE"), Some(&json!(false)));
        let result = run(&mut restored, "SELECT * FROM tasks", Value::Null).unwrap();
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
    }
}
