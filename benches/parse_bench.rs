use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tabula::{serialize, FactoryRegistry, ParseCoordinator, Scope, TypeRegistry};

fn coordinator() -> ParseCoordinator {
    ParseCoordinator::new(
        Arc::new(TypeRegistry::new()),
        Arc::new(FactoryRegistry::new()),
    )
}

fn flat_document(keys: usize) -> String {
    let mut doc = String::from("{");
    for i in 0..keys {
        if i > 0 {
            doc.push(',');
        }
        doc.push_str(&format!("\"Key{}\": {}", i, i));
    }
    doc.push('}');
    doc
}

fn nested_document(depth: usize) -> String {
    let mut doc = String::from("{\"Leaf\": 1}");
    for i in 0..depth {
        doc = format!("{{\"Level{}\": {}}}", i, doc);
    }
    doc
}

fn bench_parse_flat(c: &mut Criterion) {
    let document = flat_document(100);
    c.bench_function("parse_flat_100_keys", |b| {
        let mut parser = coordinator();
        b.iter(|| parser.parse(black_box(&document)).unwrap())
    });
}

fn bench_parse_nested(c: &mut Criterion) {
    let document = nested_document(50);
    c.bench_function("parse_nested_50_levels", |b| {
        let mut parser = coordinator();
        b.iter(|| parser.parse(black_box(&document)).unwrap())
    });
}

fn bench_deep_clone(c: &mut Criterion) {
    let mut parser = coordinator();
    let root = parser.parse(&nested_document(20)).unwrap();
    c.bench_function("scope_deep_clone_20_levels", |b| {
        b.iter(|| Scope::deep_clone(black_box(&root)))
    });
}

fn bench_serialize(c: &mut Criterion) {
    let mut parser = coordinator();
    let root = parser.parse(&flat_document(100)).unwrap();
    c.bench_function("serialize_flat_100_keys", |b| {
        b.iter(|| serialize::to_json(black_box(&root)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_parse_flat,
    bench_parse_nested,
    bench_deep_clone,
    bench_serialize
);
criterion_main!(benches);
