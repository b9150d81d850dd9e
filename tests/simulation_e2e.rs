//! End-to-end tests for policy simulation.

mod common;

use common::World;
use mooclet::measure::names::{EXPLANATION_PROBABILITY, WEIGHT};
use mooclet::{Context, EntityTag, RecordMode, VariableSpec};

#[test]
fn uniform_frequencies_sit_near_one_half() {
    let world = World::new("uniform_random");
    let mooclet = world.mooclet(1000);
    let report = world
        .runner(4, 42)
        .simulate_probabilities(&mooclet, &Context::new().with(mooclet.clone()), 10_000)
        .unwrap();

    assert_eq!(report.iterations, 10_000);
    assert_eq!(report.counts.values().sum::<usize>(), 10_000);
    for version in [1, 2] {
        let f = report.frequency(version);
        assert!((0.47..=0.53).contains(&f), "version {version} frequency {f}");
    }
}

#[test]
fn frequencies_sum_to_one_and_are_stored() {
    let world = World::new("uniform_random");
    let mooclet = world.mooclet(1000);
    let report = world
        .runner(3, 7)
        .simulate_probabilities(&mooclet, &Context::new().with(mooclet.clone()), 1_000)
        .unwrap();

    let total: f64 = report.frequencies.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(report.frequencies.len(), 2);

    let m = world.measurements();
    let probability = m.variable(EXPLANATION_PROBABILITY).unwrap();
    assert_eq!(probability.scope, Some(EntityTag::Version));
    for version in [1, 2] {
        assert_eq!(
            m.current_value(&probability, Some(version), None).unwrap(),
            Some(report.frequency(version))
        );
    }

    world
        .runner(3, 8)
        .simulate_diagnostic(&mooclet, &Context::new().with(mooclet.clone()))
        .unwrap();
    assert_eq!(m.values_for(&probability, Some(1)).unwrap().len(), 1);
}

#[test]
fn worker_count_does_not_change_totals() {
    let world = World::new("uniform_random");
    let mooclet = world.mooclet(1000);
    let context = Context::new().with(mooclet.clone());
    for workers in [1, 2, 8, 64] {
        let report = world.runner(workers, 1).estimate(&mooclet, &context, 37).unwrap();
        assert_eq!(report.counts.values().sum::<usize>(), 37);
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let world = World::new("uniform_random");
    let mooclet = world.mooclet(1000);
    let context = Context::new().with(mooclet.clone());
    let a = world.runner(4, 99).estimate(&mooclet, &context, 2_000).unwrap();
    let b = world.runner(4, 99).estimate(&mooclet, &context, 2_000).unwrap();
    assert_eq!(a.counts, b.counts);
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn zero_iterations_is_a_validation_error() {
    let world = World::new("uniform_random");
    let mooclet = world.mooclet(1000);
    let err = world
        .runner(2, 1)
        .simulate_probabilities(&mooclet, &Context::new().with(mooclet.clone()), 0)
        .unwrap_err();
    assert!(err.is_validation());
    assert!(world
        .measurements()
        .find_variable(EXPLANATION_PROBABILITY)
        .unwrap()
        .is_none());
}

#[test]
fn weighted_policy_reports_unchosen_versions_at_zero() {
    let world = World::new("weighted_random");
    let m = world.measurements();
    let weight = m
        .get_or_create_variable(
            VariableSpec::new(WEIGHT)
                .scope(EntityTag::Version)
                .mode(RecordMode::Aggregate),
        )
        .unwrap();
    m.write(&weight, Some(1), 1.0, None).unwrap();

    let mooclet = world.mooclet(1000);
    let report = world
        .runner(2, 5)
        .estimate(&mooclet, &Context::new().with(mooclet.clone()), 500)
        .unwrap();
    assert_eq!(report.counts.get(&2), Some(&0));
    assert_eq!(report.frequency(1), 1.0);
}

#[test]
fn failing_policy_aborts_the_run() {
    let world = World::new("weighted_random");
    let mooclet = world.mooclet(1000);
    let err = world
        .runner(4, 5)
        .estimate(&mooclet, &Context::new().with(mooclet.clone()), 1_000)
        .unwrap_err();
    assert!(err.is_execution());
    assert!(err.to_string().contains("weighted_random"));
}
