//! Performance benchmarks for quickstart-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quickstart_engine::{dql::parse, Store, StoreSnapshot};
use serde_json::{json, Map, Value};

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn populated_store(size: usize) -> Store {
    let mut store = Store::new("peer1");
    let insert = parse("INSERT INTO tasks DOCUMENTS (:task)").unwrap();
    for i in 0..size {
        let params = args(json!({
            "task": {
                "_id": format!("task_{:05}", i),
                "title": format!("Task {}", i),
                "done": i % 3 == 0,
                "deleted": i % 10 == 0,
            }
        }));
        let _ = store.execute(&insert, &params, 1000);
    }
    store
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.bench_function("select_filtered", |b| {
        b.iter(|| {
            parse(black_box(
                "SELECT * FROM tasks WHERE contains(_id, :idSubstring) AND NOT deleted ORDER BY _id",
            ))
        })
    });

    group.bench_function("update", |b| {
        b.iter(|| {
            parse(black_box(
                "UPDATE tasks SET title = :title, done = :done, deleted = :deleted WHERE _id = :id",
            ))
        })
    });

    group.finish();
}

fn bench_store_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_operations");

    group.bench_function("insert", |b| {
        let mut store = Store::new("peer1");
        let insert = parse("INSERT INTO tasks DOCUMENTS (:task)").unwrap();
        let params = args(json!({"task": {"title": "Test task", "done": false, "deleted": false}}));

        b.iter(|| store.execute(black_box(&insert), black_box(&params), 1000))
    });

    group.bench_function("update_by_id", |b| {
        let mut store = populated_store(1000);
        let update = parse("UPDATE tasks SET done = :done WHERE _id = :id").unwrap();
        let params = args(json!({"id": "task_00500", "done": true}));

        b.iter(|| store.execute(black_box(&update), black_box(&params), 1000))
    });

    for size in [100, 500, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("select_active", size), size, |b, &size| {
            let mut store = populated_store(size);
            let select = parse("SELECT * FROM tasks WHERE NOT deleted ORDER BY _id").unwrap();
            let params = Map::new();

            b.iter(|| store.execute(black_box(&select), &params, 1000))
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for size in [100, 500, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("export", size), size, |b, &size| {
            let store = populated_store(size);
            b.iter(|| store.export_state())
        });

        group.bench_with_input(BenchmarkId::new("from_json", size), size, |b, &size| {
            let json = populated_store(size).export_state().to_json().unwrap();
            b.iter(|| StoreSnapshot::from_json(black_box(&json)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_store_operations, bench_snapshot);
criterion_main!(benches);
