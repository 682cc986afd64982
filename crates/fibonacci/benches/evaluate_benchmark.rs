use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use x86e_fibonacci::{checked_evaluate, evaluate};

fn evaluate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    for n in [7, 46, 1_000_000] {
        group.bench_with_input(BenchmarkId::new("wrapping", n), &n, |b, &n| {
            b.iter(|| evaluate(black_box(n)))
        });
    }

    group.bench_with_input(BenchmarkId::new("checked", 46), &46, |b, &n| {
        b.iter(|| checked_evaluate(black_box(n)))
    });

    group.finish();
}

criterion_group!(benches, evaluate_benchmark);
criterion_main!(benches);
