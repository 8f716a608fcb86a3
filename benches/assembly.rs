//! Criterion benchmarks for the assembly engine.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use nemora::prelude::*;

fn formed_brain(n: u32, k: u32, seed: u64) -> Brain {
    let cfg = BrainConfig::new(0.05).with_seed(seed);
    let mut brain = Brain::new(cfg).unwrap();
    brain.add_stimulus("stim", k).unwrap();
    brain.add_area("A", n, k, 0.05).unwrap();
    brain
        .project(&Projection::new().stimulus("stim", &["A"]))
        .unwrap();
    let proj = Projection::new().stimulus("stim", &["A"]).area("A", &["A"]);
    brain.project_rounds(&proj, 9).unwrap();
    brain
}

/// One projection round on an already-formed assembly, across area sizes.
fn bench_round_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_size");

    for &(n, k) in &[(10_000u32, 100u32), (100_000, 317), (1_000_000, 1000)] {
        group.throughput(Throughput::Elements(k as u64));
        group.bench_with_input(BenchmarkId::new("implicit", n), &(n, k), |b, &(n, k)| {
            let mut brain = formed_brain(n, k, 42);
            let proj = Projection::new().stimulus("stim", &["A"]).area("A", &["A"]);
            b.iter(|| {
                brain.project(&proj).unwrap();
                black_box(brain.area("A").unwrap().w())
            });
        });
    }

    group.finish();
}

/// Exact top-k over a fully materialized area.
fn bench_explicit_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("explicit_round");

    for &n in &[1_000u32, 10_000] {
        let k = n / 10;
        group.throughput(Throughput::Elements(k as u64));
        group.bench_with_input(BenchmarkId::new("explicit", n), &n, |b, &n| {
            let cfg = BrainConfig::new(0.05).with_seed(42);
            let mut brain = Brain::new(cfg).unwrap();
            brain.add_stimulus("stim", k).unwrap();
            brain.add_explicit_area("E", n, k, 0.05).unwrap();
            let proj = Projection::new().stimulus("stim", &["E"]).area("E", &["E"]);
            brain.project(&proj).unwrap();
            b.iter(|| {
                brain.project(&proj).unwrap();
                black_box(brain.area("E").unwrap().num_first_winners())
            });
        });
    }

    group.finish();
}

/// Deep-copy cost of branching a formed brain.
fn bench_branch(c: &mut Criterion) {
    let mut group = c.benchmark_group("branch");

    let brain = formed_brain(100_000, 317, 42);
    group.bench_function("clone_formed", |b| {
        b.iter(|| black_box(brain.branch().diagnostics().synapses));
    });

    group.finish();
}

criterion_group!(benches, bench_round_sizes, bench_explicit_round, bench_branch);
criterion_main!(benches);
