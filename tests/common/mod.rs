//! Shared fixtures for the end-to-end tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use mooclet::{
    Answer, Catalog, DecisionEngine, EntityTag, Explanation, GatewayError, InMemoryMeasurementStore,
    LmsGateway, MeasurementConfig, MeasurementStore, Measurements, Mooclet, OwnerRef, Policy,
    PolicyRegistry, Question, Quiz, QuizService, SimulationConfig, SimulationRunner, User, Version,
};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Grades seen by the LMS.
#[derive(Default)]
pub struct RecordingLms {
    pub grades: Mutex<Vec<(f64, u64, u64)>>,
}

impl LmsGateway for RecordingLms {
    fn grade_passback(&self, score: f64, user: &User, quiz: &Quiz) -> Result<(), GatewayError> {
        self.grades.lock().unwrap().push((score, user.id, quiz.id));
        Ok(())
    }
}

/// A two-question quiz wired up for explanations.
///
/// - quiz 1 holds questions 10 and 20
/// - question 10 has answers 100, 101; question 20 has answers 200, 201
/// - answer 100 carries explanation mooclet 1000 (versions 1, 2)
/// - answer 200 carries explanation mooclet 2000 (versions 3, 4)
/// - users 7 and 8 exist
pub struct World {
    pub catalog: Arc<Catalog>,
    pub engine: DecisionEngine,
}

impl World {
    pub fn new(policy: &str) -> Self {
        Self::with_store(policy, Arc::new(InMemoryMeasurementStore::new()))
    }

    pub fn with_store(policy: &str, store: Arc<dyn MeasurementStore>) -> Self {
        init_tracing();
        let catalog = Arc::new(Catalog::new().unwrap());
        catalog.add_quiz(Quiz::new(1, "Limits")).unwrap();
        catalog.add_user(User { id: 7, name: "ada".to_string() }).unwrap();
        catalog.add_user(User { id: 8, name: "bob".to_string() }).unwrap();
        catalog.add_policy(Policy::new(1, policy)).unwrap();

        for (question, mooclet, first_version) in [(10, 1000, 1), (20, 2000, 3)] {
            catalog
                .add_question(Question {
                    id: question,
                    quiz_id: 1,
                    text: format!("question {question}"),
                })
                .unwrap();
            for offset in 0..2 {
                catalog
                    .add_answer(Answer {
                        id: question * 10 + offset,
                        question_id: question,
                        text: format!("answer {offset}"),
                        correct: offset == 0,
                        order: u32::try_from(offset + 1).unwrap(),
                        mooclet_explanation: None,
                    })
                    .unwrap();
            }
            catalog
                .add_mooclet(
                    Mooclet::new(mooclet, format!("why {question}"), "explanation", 1)
                        .attached_to(OwnerRef::new(EntityTag::Answer, question * 10)),
                )
                .unwrap();
            for version in first_version..first_version + 2 {
                let explanation = 500 + version;
                catalog
                    .add_explanation(Explanation {
                        id: explanation,
                        text: format!("explanation {version}"),
                    })
                    .unwrap();
                catalog
                    .add_version(
                        Version::new(version, mooclet, format!("v{version}"))
                            .with_explanation(explanation),
                    )
                    .unwrap();
            }
        }

        let measurements = Measurements::new(
            store,
            Arc::clone(catalog.resolver()),
            MeasurementConfig::default(),
        );
        let engine = DecisionEngine::new(
            Arc::clone(&catalog),
            measurements,
            Arc::new(PolicyRegistry::with_builtins().unwrap()),
        );
        Self { catalog, engine }
    }

    pub fn measurements(&self) -> &Measurements {
        self.engine.measurements()
    }

    pub fn mooclet(&self, id: u64) -> Mooclet {
        self.catalog.mooclet(id).unwrap()
    }

    pub fn runner(&self, workers: usize, seed: u64) -> SimulationRunner {
        SimulationRunner::new(
            self.engine.clone(),
            SimulationConfig {
                default_iterations: 1_000,
                diagnostic_iterations: 50,
                workers,
                seed: Some(seed),
            },
        )
    }

    pub fn service(&self, lms: Arc<RecordingLms>) -> QuizService {
        QuizService::new(self.runner(2, 3), lms)
    }
}
