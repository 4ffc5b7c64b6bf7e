//! Benchmarking suite for the indexing core: entity writes through the
//! coordinator, equality/range scans, graph traversal, and vector search.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::time::Duration;
use tempfile::TempDir;
use themis::core::common::types::Value;
use themis::core::entity::Entity;
use themis::core::graph_index::Edge;
use themis::core::secondary_index::meta::IndexKind;
use themis::core::vector_index::distance::Metric;
use themis::{Database, StoreConfig};

fn open_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(StoreConfig { db_path: dir.path().to_path_buf(), ..Default::default() }).unwrap();
    (dir, db)
}

fn bench_put_entity(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_entity");
    group.measurement_time(Duration::from_secs(10));
    let size = 100u64;
    group.throughput(Throughput::Elements(size));

    group.bench_function("batch_puts_no_indexes", |b| {
        b.iter_batched(
            open_db,
            |(_dir, db)| {
                for i in 1..=size {
                    let mut e = Entity::new(format!("u{i}")).unwrap();
                    e.set("name", Value::Text(format!("user-{i}")));
                    e.set("value", Value::Integer((i * 10) as i64));
                    black_box(db.put_entity("bench", &e).unwrap());
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_equality_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("equality_scan");
    group.measurement_time(Duration::from_secs(10));
    let size = 100u64;
    group.throughput(Throughput::Elements(size));

    group.bench_function("scan_equal_over_declared_index", |b| {
        b.iter_batched(
            || {
                let (dir, db) = open_db();
                db.declare_index("bench", &["age"], IndexKind::Equality, false, None, None, None).unwrap();
                for i in 1..=size {
                    let mut e = Entity::new(format!("u{i}")).unwrap();
                    e.set("age", Value::Integer(((i % 10) + 18) as i64));
                    db.put_entity("bench", &e).unwrap();
                }
                (dir, db)
            },
            |(_dir, db)| {
                black_box(db.scan_equal("bench", "age", "20").unwrap());
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_range_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_scan");
    group.measurement_time(Duration::from_secs(10));
    let size = 100u64;
    group.throughput(Throughput::Elements(size));

    group.bench_function("scan_range_ascending", |b| {
        b.iter_batched(
            || {
                let (dir, db) = open_db();
                db.declare_index("bench", &["age"], IndexKind::Range, false, None, None, None).unwrap();
                for i in 1..=size {
                    let mut e = Entity::new(format!("u{i}")).unwrap();
                    e.set("age", Value::Integer(i as i64));
                    db.put_entity("bench", &e).unwrap();
                }
                (dir, db)
            },
            |(_dir, db)| {
                black_box(
                    db.scan_range("bench", "age", Some(&Value::Integer(10)), Some(&Value::Integer(90)), true, true, 1000, false)
                        .unwrap(),
                );
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_graph_bfs(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_bfs");
    group.measurement_time(Duration::from_secs(10));
    let chain_len = 100u64;
    group.throughput(Throughput::Elements(chain_len));

    group.bench_function("bfs_over_linear_chain", |b| {
        b.iter_batched(
            || {
                let (dir, db) = open_db();
                for i in 0..chain_len {
                    let edge = Edge::new(format!("e{i}"), format!("n{i}"), format!("n{}", i + 1)).with_type("NEXT");
                    db.add_edge("g1", edge).unwrap();
                }
                (dir, db)
            },
            |(_dir, db)| {
                black_box(db.bfs("g1", "n0", chain_len as usize, Some("NEXT")).unwrap());
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_vector_search_knn(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_search_knn");
    group.measurement_time(Duration::from_secs(10));
    let size = 200u64;
    group.throughput(Throughput::Elements(size));

    group.bench_function("search_knn_cosine", |b| {
        b.iter_batched(
            || {
                let (dir, db) = open_db();
                db.init_vector_object("docs", 8, Metric::Cosine, 16, 64, 32).unwrap();
                for i in 0..size {
                    let mut e = Entity::new(format!("d{i}")).unwrap();
                    let angle = i as f32 * 0.01;
                    e.set("embedding", Value::Vector(vec![angle.cos(), angle.sin(), 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
                    db.add_vector_entity("docs", &e, "embedding").unwrap();
                }
                (dir, db)
            },
            |(_dir, db)| {
                black_box(db.search_knn("docs", &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 10, None).unwrap());
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_put_entity,
    bench_equality_scan,
    bench_range_scan,
    bench_graph_bfs,
    bench_vector_search_knn
);
criterion_main!(benches);
