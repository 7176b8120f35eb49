use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use smc_engine::{ConstraintSpec, RegexPotential, SmcEngine};

#[path = "../tests/common/mod.rs"]
mod common;

fn bench_generation(c: &mut Criterion) {
    let vocabulary = common::char_vocabulary();
    let constrained = ConstraintSpec::new()
        .with(RegexPotential::new(r"[\s\S]*[.!?]", vocabulary).unwrap())
        .unwrap();
    let unconstrained = ConstraintSpec::new();
    let engine = SmcEngine::new(Arc::new(common::char_model()));

    let mut group = c.benchmark_group("step_throughput");
    for particles in [16usize, 64] {
        let config = common::config(particles, 20, 7);
        group.bench_with_input(
            BenchmarkId::new("unconstrained", particles),
            &config,
            |b, config| b.iter(|| engine.run("", &unconstrained, config).unwrap()),
        );
        group.bench_with_input(
            BenchmarkId::new("regex_masked", particles),
            &config,
            |b, config| b.iter(|| engine.run("", &constrained, config).unwrap()),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_generation);
criterion_main!(benches);
