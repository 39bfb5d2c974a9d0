use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use linscan::{build, search, BuildOptions, SparseVector};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

const VOCAB: usize = 30_000;

fn random_vectors(rng: &mut StdRng, n: usize, nnz: usize) -> Vec<SparseVector> {
    (0..n)
        .map(|_| {
            sample(rng, VOCAB, nnz)
                .into_iter()
                .map(|d| (d as u32, rng.gen_range(0.01f32..3.0)))
                .collect()
        })
        .collect()
}

fn bench_search(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let docs = random_vectors(&mut rng, 20_000, 120);
    let queries = random_vectors(&mut rng, 64, 40);
    let index = build(&docs, &BuildOptions::default()).expect("build");

    let mut group = c.benchmark_group("batch_search");
    for budget in [0.1, 0.5, 1.0] {
        group.bench_with_input(BenchmarkId::from_parameter(budget), &budget, |b, &budget| {
            b.iter(|| search(&index, &queries, 10, budget).expect("search"))
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let docs = random_vectors(&mut rng, 5_000, 120);
    c.bench_function("build_5k", |b| b.iter(|| build(&docs, &BuildOptions::default()).expect("build")));
}

criterion_group!(benches, bench_search, bench_build);
criterion_main!(benches);
