//! Times complete learning runs on random targets.
//!
//! Run with: cargo bench --bench learning

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lattice_automata::prelude::*;

fn targets(size: usize) -> Vec<LatticeAutomaton<ChainOps>> {
    let alphabet = CharAlphabet::of_size(2);
    let lattice = Lattice::linear(3);
    let mut rng = fastrand::Rng::with_seed(size as u64);
    (0..8)
        .map(|_| generate_random_ldfa(&alphabet, &lattice, size, true, &mut rng).unwrap())
        .collect()
}

fn bench_learners(c: &mut Criterion) {
    let mut group = c.benchmark_group("learning");

    for size in [2, 4, 6] {
        let targets = targets(size);

        group.bench_with_input(BenchmarkId::new("folstar", size), &targets, |b, targets| {
            b.iter(|| {
                for target in targets {
                    let oracle = AutomatonOracle::new(target.clone());
                    let result = Learner::folstar(
                        target.alphabet().clone(),
                        target.lattice().clone(),
                        oracle.clone(),
                        oracle,
                        LearnerConfig::default(),
                    )
                    .run();
                    black_box(result.ok());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("lstar", size), &targets, |b, targets| {
            b.iter(|| {
                for target in targets {
                    let oracle = AutomatonOracle::new(target.clone());
                    let result = Learner::lstar(
                        target.alphabet().clone(),
                        target.lattice().clone(),
                        oracle.clone(),
                        oracle,
                        LearnerConfig::default(),
                    )
                    .run();
                    black_box(result.ok());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_learners);
criterion_main!(benches);
