//! Query build and evaluation benchmarks.
//!
//! Run with: cargo bench -p pathql-query

#![allow(missing_docs)]

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use pathql_core::{row, EntityData};
use pathql_query::{
    build_query, EvaluationContext, Evaluator, EvaluatorOptions, RelationshipMap,
};

/// Generate `classes` classes with `methods_per_class` methods each.
fn generate_context(classes: usize, methods_per_class: usize) -> EvaluationContext {
    let mut relationships = RelationshipMap::new();
    relationships.add_relationship("class", "methods", ["method"]);

    let class_rows = (0..classes)
        .map(|i| row! { "id" => i, "name" => format!("Class{i}"), "methodCount" => methods_per_class })
        .collect();
    let method_rows = (0..classes * methods_per_class)
        .map(|i| {
            row! {
                "id" => i,
                "name" => format!("method{}", i % 7),
                "class_id" => i / methods_per_class,
                "lineCount" => i % 200,
            }
        })
        .collect();

    let mut data = EntityData::new();
    data.insert("class".to_string(), class_rows);
    data.insert("method".to_string(), method_rows);
    EvaluationContext::new(Arc::new(relationships), data)
}

const SINGLE: &str = "FROM method AS m WHERE m.lineCount > 100 && m.name != \"method3\" SELECT m";
const RELATED: &str = "FROM class AS c, method AS m WHERE c.methodCount > m.lineCount SELECT c, m";
const PREDICATE: &str = "predicate long(method x) { x.lineCount > 150 } \
                         FROM method AS m WHERE long(m) || m.name == \"method1\" SELECT m";

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_query");
    for (name, source) in [("single", SINGLE), ("related", RELATED), ("predicate", PREDICATE)] {
        group.bench_function(name, |b| b.iter(|| build_query(black_box(source))));
    }
    group.finish();
}

fn bench_evaluate_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_scaling");
    let query = build_query(SINGLE).unwrap();

    for classes in [10, 100, 1000] {
        let context = generate_context(classes, 10);
        group.throughput(Throughput::Elements((classes * 10) as u64));
        group.bench_with_input(BenchmarkId::new("single", classes), &context, |b, context| {
            let evaluator = Evaluator::for_query(context, &query);
            b.iter(|| evaluator.execute(black_box(&query)));
        });
    }

    group.finish();
}

fn bench_joins(c: &mut Criterion) {
    let mut group = c.benchmark_group("dual_entity");
    let query = build_query(RELATED).unwrap();
    let context = generate_context(50, 10);

    group.bench_function("relationship_join", |b| {
        let evaluator = Evaluator::for_query(&context, &query);
        b.iter(|| evaluator.execute(black_box(&query)));
    });

    let mut unrelated = context.clone();
    unrelated.relationships = Arc::new(RelationshipMap::new());
    group.bench_function("cross_join", |b| {
        let evaluator = Evaluator::for_query(&unrelated, &query);
        b.iter(|| evaluator.execute(black_box(&query)));
    });

    group.finish();
}

fn bench_expression_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression_cache");
    let query = build_query(PREDICATE).unwrap();
    let context = generate_context(100, 10);

    for cache_expressions in [true, false] {
        let options = EvaluatorOptions {
            cache_expressions,
            ..EvaluatorOptions::default()
        };
        group.bench_function(if cache_expressions { "cached" } else { "uncached" }, |b| {
            let evaluator = Evaluator::with_options(&context, options);
            b.iter(|| evaluator.execute(black_box(&query)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_evaluate_scaling,
    bench_joins,
    bench_expression_cache
);
criterion_main!(benches);
