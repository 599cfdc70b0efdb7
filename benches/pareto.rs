//! Benchmarks for the non-dominated filter.

use criterion::{
    BenchmarkId, Criterion, black_box, criterion_group, criterion_main,
};
use rand::prelude::*;
use rand::rngs::StdRng;

use metapop::search::{CompositeScore, ScoredProgram, remove_dominated};

fn random_entries(count: usize, dims: usize, seed: u64) -> Vec<ScoredProgram<u64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count as u64)
        .map(|id| ScoredProgram {
            program: id,
            bscore: (0..dims).map(|_| rng.gen_range(0.0..10.0)).collect(),
            score: CompositeScore::new(0.0, 1),
        })
        .collect()
}

fn bench_filter_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("nondominated_filter");

    for size in [100, 500, 2000] {
        let entries = random_entries(size, 4, 42);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_entries", size)),
            &size,
            |b, _| {
                b.iter(|| {
                    let mut copy = entries.clone();
                    remove_dominated(black_box(&mut copy), 1);
                    copy.len()
                });
            },
        );
    }

    group.finish();
}

fn bench_filter_jobs(c: &mut Criterion) {
    let mut group = c.benchmark_group("nondominated_filter_jobs");

    let entries = random_entries(2000, 4, 42);
    for jobs in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_jobs", jobs)),
            &jobs,
            |b, &jobs| {
                b.iter(|| {
                    let mut copy = entries.clone();
                    remove_dominated(black_box(&mut copy), jobs);
                    copy.len()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_filter_sizes, bench_filter_jobs);
criterion_main!(benches);
