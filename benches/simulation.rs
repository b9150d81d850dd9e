use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mooclet::{
    Catalog, Context, DecisionEngine, EntityTag, InMemoryMeasurementStore, Measurements, Mooclet,
    MoocletType, Policy, PolicyRegistry, SimulationConfig, SimulationRunner, Version,
    VariableSpec,
};

const ITERATIONS: usize = 10_000;

fn make_runner(policy: &str, versions: u64, workers: usize) -> (SimulationRunner, Mooclet) {
    let catalog = Arc::new(Catalog::new().unwrap());
    catalog.add_policy(Policy::new(1, policy)).unwrap();
    catalog
        .add_mooclet_type(MoocletType::new("standalone", None))
        .unwrap();
    let mooclet = Mooclet::new(1, "bench", "standalone", 1);
    catalog.add_mooclet(mooclet.clone()).unwrap();
    for id in 1..=versions {
        catalog
            .add_version(Version::new(id, 1, format!("v{id}")))
            .unwrap();
    }

    let measurements = Measurements::new(
        Arc::new(InMemoryMeasurementStore::new()),
        Arc::clone(catalog.resolver()),
        Default::default(),
    );

    // Seed 64 ratings per version so Thompson sampling reads realistic history.
    let rating = measurements
        .get_or_create_variable(
            VariableSpec::new("student_rating")
                .scope(EntityTag::Version)
                .user_variable(true),
        )
        .unwrap();
    for version in 1..=versions {
        for user in 0..64u32 {
            let score = f64::from((user + u32::try_from(version).unwrap()) % 7 + 1);
            measurements
                .record(&rating, version, score, Some(u64::from(user)))
                .unwrap();
        }
    }

    let engine = DecisionEngine::new(
        catalog,
        measurements,
        Arc::new(PolicyRegistry::with_builtins().unwrap()),
    );
    let runner = SimulationRunner::new(
        engine,
        SimulationConfig {
            workers,
            seed: Some(17),
            ..SimulationConfig::default()
        },
    );
    (runner, mooclet)
}

fn bench_uniform_by_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation/uniform_random");
    group.throughput(Throughput::Elements(ITERATIONS as u64));
    for workers in [1, 2, 4, 8] {
        let (runner, mooclet) = make_runner("uniform_random", 4, workers);
        let context = Context::new().with(mooclet.clone());
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| runner.estimate(&mooclet, &context, ITERATIONS).unwrap());
        });
    }
    group.finish();
}

fn bench_thompson(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation/thompson_sampling");
    group.throughput(Throughput::Elements(1_000));
    group.sample_size(20);
    let (runner, mooclet) = make_runner("thompson_sampling", 4, 4);
    let context = Context::new().with(mooclet.clone());
    group.bench_function("estimate_1000", |b| {
        b.iter(|| runner.estimate(&mooclet, &context, 1_000).unwrap());
    });
    group.finish();
}

criterion_group!(simulation, bench_uniform_by_workers, bench_thompson);
criterion_main!(simulation);
