//! End-to-end tests for the quiz flows.

mod common;

use std::sync::Arc;

use common::{RecordingLms, World};
use mooclet::measure::names::{
    ANSWER_CHOICE_COUNT, ANSWER_PROPORTION, EXPLANATION_PROBABILITY, MEAN_STUDENT_RATING,
    NUM_STUDENTS, QUIZ_GRADE,
};
use mooclet::{
    Context, EngineConfig, EntityTag, InMemoryMeasurementStore, NoopLmsGateway, Outcome,
    QuizService,
};

#[test]
fn student_journey_feeds_the_results_views() {
    let world = World::new("uniform_random");
    let lms = Arc::new(RecordingLms::default());
    let service = world.service(lms.clone());

    // two students answer question 10 with the first choice and rate what they saw
    let mut shown = Vec::new();
    for (user, rating) in [(7, 6.0), (8, 2.0)] {
        let choice = service.select_explanation(10, 1, Some(user)).unwrap();
        assert_eq!(choice.explanation_id, Some(500 + choice.version_id));
        service.submit_rating(choice.version_id, user, rating).unwrap();
        shown.push((choice.version_id, rating));
    }
    service.submit_quiz_grade(7, 1, 1.0, false).unwrap();
    service.submit_quiz_grade(8, 1, 0.5, false).unwrap();
    assert_eq!(lms.grades.lock().unwrap().len(), 2);

    let (version, _) = shown[0];
    let report = service.update_intermediates(version, 10).unwrap();
    assert!(report.ratings.is_some());
    assert_eq!(report.answer_proportions.get(&100), Some(&1.0));
    assert_eq!(report.answer_proportions.get(&101), Some(&0.0));

    let results = service.mooclet_results(1, 1000).unwrap();
    assert_eq!(results.rows, vec![1, 2]);
    let rated: f64 = [1, 2]
        .iter()
        .filter_map(|&v| results.get(v, NUM_STUDENTS))
        .sum();
    assert_eq!(rated, 2.0);
    let probability_total: f64 = [1, 2]
        .iter()
        .filter_map(|&v| results.get(v, EXPLANATION_PROBABILITY))
        .sum();
    assert!((probability_total - 1.0).abs() < 1e-9);
    for (version, rating) in &shown {
        let mean = results.get(*version, MEAN_STUDENT_RATING).unwrap();
        assert!(mean >= 2.0 && mean <= 6.0, "version {version} rated {rating}, mean {mean}");
    }

    let question = service.question_results(1, 10).unwrap();
    assert_eq!(question.get(100, ANSWER_CHOICE_COUNT), Some(2.0));
    assert_eq!(question.get(100, ANSWER_PROPORTION), Some(1.0));
    assert_eq!(question.get(101, ANSWER_PROPORTION), Some(0.0));

    let grade = world.measurements().variable(QUIZ_GRADE).unwrap();
    assert_eq!(grade.scope, Some(EntityTag::Quiz));
    assert_eq!(world.measurements().values_for(&grade, Some(1)).unwrap().len(), 2);
}

#[test]
fn question_results_stay_within_their_question() {
    let world = World::new("uniform_random");
    let service = world.service(Arc::new(RecordingLms::default()));
    service.select_explanation(20, 1, None).unwrap();

    let other = service.question_results(1, 10).unwrap();
    assert_eq!(other.get(100, ANSWER_CHOICE_COUNT), None);
    let own = service.question_results(1, 20).unwrap();
    assert_eq!(own.get(200, ANSWER_CHOICE_COUNT), Some(1.0));
}

#[test]
fn generic_values_attach_to_the_requested_owner() {
    let world = World::new("uniform_random");
    let service = world.service(Arc::new(RecordingLms::default()));
    let params = vec![
        ("quizsource".to_string(), "lti".to_string()),
        ("confidence".to_string(), "3".to_string()),
        ("mood".to_string(), "tired".to_string()),
    ];
    let outcome = service
        .submit_values(8, Some(EntityTag::Question), Some(10), &params, false)
        .unwrap();
    let Outcome::Saved(counts) = outcome else {
        panic!("values were not saved");
    };
    assert_eq!((counts.saved, counts.unsaved), (1, 1));

    let m = world.measurements();
    let confidence = m.variable("confidence").unwrap();
    let values = m.history(&confidence, Some(10), Some(8)).unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value, 3.0);
}

#[test]
fn unknown_records_are_not_found() {
    let world = World::new("uniform_random");
    let service = world.service(Arc::new(RecordingLms::default()));
    assert!(service.submit_rating(42, 7, 3.0).unwrap_err().is_not_found());
    assert!(service.submit_quiz_grade(7, 42, 1.0, false).unwrap_err().is_not_found());
    assert!(service.update_intermediates(1, 42).unwrap_err().is_not_found());
    assert!(service.mooclet_results(1, 42).unwrap_err().is_not_found());
}

#[test]
fn service_built_from_config_uses_its_settings() {
    let world = World::new("uniform_random");
    let config = EngineConfig::from_json(
        r#"{"simulation": {"default_iterations": 300, "workers": 3, "seed": 4}}"#,
    )
    .unwrap();
    let service = QuizService::from_config(
        Arc::clone(&world.catalog),
        Arc::new(InMemoryMeasurementStore::new()),
        Arc::new(NoopLmsGateway),
        &config,
    )
    .unwrap();
    assert_eq!(service.runner().config(), &config.simulation);

    let mooclet = world.mooclet(1000);
    let report = service
        .runner()
        .simulate_default(&mooclet, &Context::new().with(mooclet.clone()))
        .unwrap();
    assert_eq!(report.iterations, 300);

    let outcome = service.submit_quiz_grade(7, 1, 0.9, false).unwrap();
    assert!(matches!(outcome, Outcome::Saved(ref v) if v.value == 0.9));
    // the fresh store is separate from the world's
    assert!(world.measurements().find_variable(QUIZ_GRADE).unwrap().is_none());
}

#[test]
fn invalid_config_builds_no_service() {
    let world = World::new("uniform_random");
    let mut config = EngineConfig::default();
    config.measurements.variable_create_retries = 0;
    let err = QuizService::from_config(
        Arc::clone(&world.catalog),
        Arc::new(InMemoryMeasurementStore::new()),
        Arc::new(NoopLmsGateway),
        &config,
    )
    .unwrap_err();
    assert!(err.is_validation());
}
