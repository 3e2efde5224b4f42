//! Parser performance benchmarks.
//!
//! Run with: cargo bench -p pathql-parser

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use pathql_parser::{parse, walk, Listener, SyntaxNode};

/// Generate a query with `n` predicate declarations and an `n`-term WHERE clause.
fn generate_query(n: usize) -> String {
    let mut source = String::new();
    for i in 0..n {
        source.push_str(&format!(
            "predicate p{i}(method m) {{ m.name == \"name{i}\" || m.getVisibility() == \"public\" }};\n"
        ));
    }
    source.push_str("FROM method AS m, class AS c\nWHERE ");
    let terms: Vec<String> = (0..n)
        .map(|i| format!("(m.line > {i} && c.name != \"C{i}\")"))
        .collect();
    source.push_str(&terms.join(" || "));
    source.push_str("\nSELECT m, m.getName(), c.name");
    source
}

struct Counter(usize);

impl<'src> Listener<'src> for Counter {
    fn enter(&mut self, _node: &SyntaxNode<'src>) {
        self.0 += 1;
    }
}

fn bench_parse_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_scaling");

    for size in [1, 10, 100, 500] {
        let query = generate_query(size);
        group.throughput(Throughput::Bytes(query.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &query, |b, query| {
            b.iter(|| parse(black_box(query)));
        });
    }

    group.finish();
}

fn bench_walk(c: &mut Criterion) {
    let query = generate_query(100);
    let tree = parse(&query).expect("benchmark query parses");

    c.bench_function("walk_100_terms", |b| {
        b.iter(|| {
            let mut counter = Counter(0);
            walk(black_box(&tree), &mut counter);
            counter.0
        });
    });
}

criterion_group!(benches, bench_parse_scaling, bench_walk);
criterion_main!(benches);
