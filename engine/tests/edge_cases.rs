//! Edge case tests for quickstart-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use quickstart_engine::{
    dql::parse, Engine, EngineConfig, Error, Identity, QueryResult, Store, StoreSnapshot,
};
use serde_json::{json, Map, Value};

fn execute(store: &mut Store, query: &str, args: Value) -> quickstart_engine::Result<QueryResult> {
    let params = match args {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    store.execute(&parse(query)?, &params, 1000)
}

fn insert(store: &mut Store, collection: &str, doc: Value) -> String {
    let result = execute(
        store,
        &format!("INSERT INTO `{}` DOCUMENTS (:doc)", collection),
        json!({ "doc": doc }),
    )
    .unwrap();
    result.mutated_document_ids[0].clone()
}

fn engine() -> Engine {
    Engine::open(EngineConfig::new(Identity::OnlinePlayground {
        app_id: "edge-cases".into(),
        token: "token".into(),
        enable_cloud_sync: false,
        custom_auth_url: None,
    }))
    .unwrap()
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn empty_string_fields() {
    let mut store = Store::new("peer1");
    let id = insert(&mut store, "items", json!({"name": ""}));

    let doc = store.get("items", &id).unwrap();
    assert_eq!(doc.fields["name"], "");
}

#[test]
fn unicode_strings() {
    let mut store = Store::new("peer1");

    let names = vec![
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Hello\nWorld\tTab",
        "Null\0Test",
    ];

    for name in &names {
        let id = insert(&mut store, "items", json!({ "name": name }));
        let result = execute(
            &mut store,
            "SELECT * FROM items WHERE name = :name",
            json!({ "name": name }),
        )
        .unwrap();
        assert_eq!(result.item_count(), 1, "Failed for: {}", name);
        assert_eq!(result.items[0].value()["_id"], json!(id));
    }
}

#[test]
fn quotes_inside_literals_and_identifiers() {
    let mut store = Store::new("peer1");
    execute(
        &mut store,
        "INSERT INTO `odd``name` DOCUMENTS ({'title': 'it''s', \"a b\": 1})",
        Value::Null,
    )
    .unwrap();

    let result = execute(
        &mut store,
        "SELECT * FROM `odd``name` WHERE title = 'it''s'",
        Value::Null,
    )
    .unwrap();
    assert_eq!(result.item_count(), 1);
    assert_eq!(result.items[0].value()["a b"], json!(1));
}

#[test]
fn very_long_strings() {
    let mut store = Store::new("peer1");
    let long = "x".repeat(100_000);
    let id = insert(&mut store, "items", json!({ "name": long }));

    let result = execute(
        &mut store,
        "SELECT * FROM items WHERE length(name) = 100000",
        Value::Null,
    )
    .unwrap();
    assert_eq!(result.items[0].value()["_id"], json!(id));
}

// ============================================================================
// Numeric Edge Cases
// ============================================================================

#[test]
fn integer_boundaries() {
    let mut store = Store::new("peer1");
    for value in [i64::MIN, -1, 0, 1, i64::MAX] {
        insert(&mut store, "nums", json!({ "n": value }));
    }

    let result = execute(&mut store, "SELECT * FROM nums ORDER BY n", Value::Null).unwrap();
    let ordered: Vec<Value> = result.iter().map(|item| item.value()["n"].clone()).collect();
    assert_eq!(
        ordered,
        vec![json!(i64::MIN), json!(-1), json!(0), json!(1), json!(i64::MAX)]
    );

    let negative = execute(&mut store, "SELECT * FROM nums WHERE n < -0.5", Value::Null).unwrap();
    assert_eq!(negative.item_count(), 2);
}

#[test]
fn clock_counter_advances_per_write() {
    let mut store = Store::new("peer1");
    insert(&mut store, "items", json!({}));
    insert(&mut store, "items", json!({}));
    execute(&mut store, "UPDATE items SET seen = true", Value::Null).unwrap();
    execute(&mut store, "SELECT * FROM items", Value::Null).unwrap();
    assert_eq!(store.clock().counter, 3);
}

// ============================================================================
// JSON Edge Cases
// ============================================================================

#[test]
fn deeply_nested_json() {
    let mut store = Store::new("peer1");
    let mut nested = json!({"value": "deep"});
    for _ in 0..50 {
        nested = json!({ "next": nested });
    }
    let id = insert(&mut store, "items", json!({ "data": nested }));

    let path = format!("data{}.value", ".next".repeat(50));
    let result = execute(
        &mut store,
        &format!("SELECT * FROM items WHERE {} = 'deep'", path),
        Value::Null,
    )
    .unwrap();
    assert_eq!(result.items[0].value()["_id"], json!(id));
}

#[test]
fn json_with_all_types() {
    let mut store = Store::new("peer1");
    let doc = json!({
        "string": "hello",
        "int": 42,
        "float": 2.5,
        "bool": true,
        "null": null,
        "array": [1, "two", false],
        "object": {"nested": "value"}
    });
    let id = insert(&mut store, "items", doc.clone());

    let mut expected = doc;
    expected["_id"] = json!(id);
    let result = execute(&mut store, "SELECT * FROM items", Value::Null).unwrap();
    assert_eq!(result.items[0].value(), &expected);
}

// ============================================================================
// Query Edge Cases
// ============================================================================

#[test]
fn syntax_errors_carry_a_position() {
    for (query, position) in [
        ("SELECT FROM tasks", 7),
        ("SELECT * FROM tasks WHERE", 25),
        ("UPDATE tasks SET = 1", 17),
        ("INSERT INTO tasks (:x)", 18),
    ] {
        match parse(query) {
            Err(Error::Syntax { position: p, .. }) => assert_eq!(p, position, "{}", query),
            other => panic!("expected syntax error for {}, got {:?}", query, other),
        }
    }
}

#[test]
fn keywords_are_case_insensitive() {
    let mut store = Store::new("peer1");
    insert(&mut store, "tasks", json!({"done": false}));
    let result = execute(
        &mut store,
        "sElEcT * fRoM tasks wHeRe NoT done OrDeR bY _id LiMiT 1",
        Value::Null,
    )
    .unwrap();
    assert_eq!(result.item_count(), 1);
}

#[test]
fn evict_without_filter_clears_collection() {
    let mut store = Store::new("peer1");
    insert(&mut store, "items", json!({}));
    insert(&mut store, "items", json!({}));
    let result = execute(&mut store, "EVICT FROM items", Value::Null).unwrap();
    assert_eq!(result.mutated_document_ids.len(), 2);
    assert!(store.collection("items").unwrap().is_empty());
}

#[test]
fn ids_with_special_characters() {
    let mut store = Store::new("peer1");
    for id in ["with space", "with'quote", "with`tick", "ünïcödé", "a/b\\c"] {
        insert(&mut store, "items", json!({ "_id": id }));
        let result = execute(
            &mut store,
            "SELECT * FROM items WHERE _id = :id",
            json!({ "id": id }),
        )
        .unwrap();
        assert_eq!(result.item_count(), 1, "id {}", id);
    }
}

// ============================================================================
// Snapshot Edge Cases
// ============================================================================

#[test]
fn snapshot_empty_store() {
    let store = Store::new("peer1");
    let snapshot = store.export_state();
    assert_eq!(snapshot.document_count(), 0);

    let json = snapshot.to_json().unwrap();
    let restored = StoreSnapshot::from_json(&json).unwrap();
    assert_eq!(restored, snapshot);
}

#[test]
fn snapshot_survives_eviction() {
    let mut store = Store::new("peer1");
    let keep = insert(&mut store, "tasks", json!({"deleted": false}));
    insert(&mut store, "tasks", json!({"deleted": true}));
    execute(&mut store, "EVICT FROM tasks WHERE deleted = true", Value::Null).unwrap();

    let restored = Store::from_snapshot(store.export_state());
    assert_eq!(restored.collection("tasks").unwrap().len(), 1);
    assert!(restored.get("tasks", &keep).is_some());
}

// ============================================================================
// Concurrency Edge Cases
// ============================================================================

#[test]
fn concurrent_inserts_from_many_threads() {
    let engine = std::sync::Arc::new(engine());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    engine
                        .store()
                        .execute_with_args(
                            "INSERT INTO tasks DOCUMENTS (:t)",
                            &json!({"t": {"title": format!("{}-{}", t, i)}}),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let all = engine.store().execute("SELECT * FROM tasks").unwrap();
    assert_eq!(all.item_count(), 200);
}
