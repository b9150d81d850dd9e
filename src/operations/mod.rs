//! Quiz flows built on the decision engine, the simulator and the
//! measurement store.
//!
//! [`QuizService`] is what an HTTP or LTI layer calls. It never renders
//! anything and never authenticates anyone; it resolves records, writes the
//! measurements each flow produces and reports what it did.

mod explanation;
mod intermediates;
mod results;
mod submission;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::decision::DecisionEngine;
use crate::entity::{EntityTag, RecordId};
use crate::error::MoocletResult;
use crate::gateway::{GatewayError, LmsGateway, SurveyProvisioner};
use crate::measure::names::{
    ANSWER_CHOICE_COUNT, ANSWER_PROPORTION, EXPLANATION_PROBABILITY, MEAN_STUDENT_RATING,
    NUM_STUDENTS, QUIZ_GRADE, RATING_STD_DEV, STUDENT_RATING,
};
use crate::measure::{Measurements, RecordMode, Variable, VariableSpec};
use crate::policy::PolicyRegistry;
use crate::simulation::SimulationRunner;
use crate::storage::MeasurementStore;

pub use explanation::ExplanationChoice;
pub use intermediates::IntermediatesReport;
pub use results::ResultsMatrix;
pub use submission::{SubmissionCounts, RESERVED_PARAMS};

/// Variables the built-in flows create on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuiltinVariable {
    StudentRating,
    QuizGrade,
    AnswerChoiceCount,
    AnswerProportion,
    ExplanationProbability,
    NumStudents,
    MeanStudentRating,
    RatingStdDev,
}

impl BuiltinVariable {
    pub(crate) fn spec(self) -> VariableSpec {
        match self {
            Self::StudentRating => VariableSpec::new(STUDENT_RATING)
                .display_name("Student Rating")
                .scope(EntityTag::Version)
                .user_variable(true),
            Self::QuizGrade => VariableSpec::new(QUIZ_GRADE)
                .display_name("Quiz Grade")
                .scope(EntityTag::Quiz)
                .user_variable(true),
            Self::AnswerChoiceCount => VariableSpec::new(ANSWER_CHOICE_COUNT)
                .display_name("Count")
                .scope(EntityTag::Answer)
                .mode(RecordMode::Aggregate),
            Self::AnswerProportion => VariableSpec::new(ANSWER_PROPORTION)
                .display_name("Answer Proportion")
                .scope(EntityTag::Answer)
                .mode(RecordMode::Aggregate),
            Self::ExplanationProbability => VariableSpec::new(EXPLANATION_PROBABILITY)
                .display_name("Explanation Probability")
                .scope(EntityTag::Version)
                .mode(RecordMode::Aggregate),
            Self::NumStudents => VariableSpec::new(NUM_STUDENTS)
                .display_name("Number of Students")
                .scope(EntityTag::Version)
                .mode(RecordMode::Aggregate),
            Self::MeanStudentRating => VariableSpec::new(MEAN_STUDENT_RATING)
                .display_name("Mean Student Rating")
                .scope(EntityTag::Version)
                .mode(RecordMode::Aggregate),
            Self::RatingStdDev => VariableSpec::new(RATING_STD_DEV)
                .display_name("Standard Deviation of Rating")
                .scope(EntityTag::Version)
                .mode(RecordMode::Aggregate),
        }
    }
}

/// Entry point for the quiz flows.
#[derive(Clone)]
pub struct QuizService {
    runner: SimulationRunner,
    lms: Arc<dyn LmsGateway>,
    surveys: Option<Arc<dyn SurveyProvisioner>>,
}

impl std::fmt::Debug for QuizService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizService")
            .field("runner", &self.runner)
            .field("surveys", &self.surveys.is_some())
            .finish_non_exhaustive()
    }
}

impl QuizService {
    #[must_use]
    pub fn new(runner: SimulationRunner, lms: Arc<dyn LmsGateway>) -> Self {
        Self {
            runner,
            lms,
            surveys: None,
        }
    }

    /// Wires a service over `catalog` and `store` with the built-in
    /// policies, after validating `config`.
    ///
    /// `config.persistent` is not read here; it belongs to whoever opens
    /// `store`.
    pub fn from_config(
        catalog: Arc<Catalog>,
        store: Arc<dyn MeasurementStore>,
        lms: Arc<dyn LmsGateway>,
        config: &EngineConfig,
    ) -> MoocletResult<Self> {
        config.validate()?;
        let measurements = Measurements::new(
            store,
            Arc::clone(catalog.resolver()),
            config.measurements.clone(),
        );
        let engine = DecisionEngine::new(
            catalog,
            measurements,
            Arc::new(PolicyRegistry::with_builtins()?),
        );
        Ok(Self::new(
            SimulationRunner::new(engine, config.simulation.clone()),
            lms,
        ))
    }

    #[must_use]
    pub fn with_survey_provisioner(mut self, surveys: Arc<dyn SurveyProvisioner>) -> Self {
        self.surveys = Some(surveys);
        self
    }

    #[must_use]
    pub fn engine(&self) -> &DecisionEngine {
        self.runner.engine()
    }

    #[must_use]
    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    fn catalog(&self) -> &Arc<Catalog> {
        self.engine().catalog()
    }

    fn measurements(&self) -> &Measurements {
        self.engine().measurements()
    }

    fn builtin(&self, variable: BuiltinVariable) -> MoocletResult<Variable> {
        self.measurements().get_or_create_variable(variable.spec())
    }

    /// Provisions an external survey for a question and stores its URL on
    /// the quiz.
    pub fn provision_survey(&self, quiz_id: RecordId, question_id: RecordId) -> MoocletResult<String> {
        let quiz = self.catalog().quiz(quiz_id)?;
        let question = self.catalog().question(question_id)?;
        let surveys = self
            .surveys
            .as_ref()
            .ok_or_else(|| GatewayError::new("survey", "no survey provisioner configured"))?;
        let url = surveys.provision(&quiz, &question)?;
        self.catalog().set_quiz_url(quiz.id, url.clone())?;
        info!(quiz_id, question_id, %url, "survey provisioned");
        Ok(url)
    }
}

/// Outcome of a flow that an instructor preview may skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Outcome<T> {
    Saved(T),
    PreviewSkipped,
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use crate::catalog::Catalog;
    use crate::config::{MeasurementConfig, SimulationConfig};
    use crate::decision::{DecisionEngine, Mooclet, Policy, Version};
    use crate::entity::{Answer, EntityTag, Explanation, OwnerRef, Question, Quiz, User};
    use crate::gateway::{GatewayError, LmsGateway, SurveyProvisioner};
    use crate::measure::Measurements;
    use crate::policy::PolicyRegistry;
    use crate::simulation::SimulationRunner;
    use crate::storage::InMemoryMeasurementStore;

    use super::QuizService;

    #[derive(Default)]
    pub(crate) struct RecordingLms {
        pub grades: Mutex<Vec<(f64, u64, u64)>>,
    }

    impl LmsGateway for RecordingLms {
        fn grade_passback(&self, score: f64, user: &User, quiz: &Quiz) -> Result<(), GatewayError> {
            self.grades.lock().unwrap().push((score, user.id, quiz.id));
            Ok(())
        }
    }

    pub(crate) struct FixedSurvey(pub &'static str);

    impl SurveyProvisioner for FixedSurvey {
        fn provision(&self, _quiz: &Quiz, question: &Question) -> Result<String, GatewayError> {
            Ok(format!("{}/{}", self.0, question.id))
        }
    }

    /// Quiz 1 > question 10 > answers 100 (order 1) and 101 (order 2).
    /// Answer 100 carries explanation mooclet 1000 with versions 1 and 2
    /// showing explanations 500 and 501. Users 7 and 8 exist.
    pub(crate) struct Setup {
        pub service: QuizService,
        pub lms: Arc<RecordingLms>,
    }

    impl Setup {
        pub(crate) fn new() -> Self {
            let catalog = Arc::new(Catalog::new().unwrap());
            catalog.add_quiz(Quiz::new(1, "Limits")).unwrap();
            catalog
                .add_question(Question {
                    id: 10,
                    quiz_id: 1,
                    text: "lim x->0 sin(x)/x?".to_string(),
                })
                .unwrap();
            for (id, order) in [(100, 1), (101, 2)] {
                catalog
                    .add_answer(Answer {
                        id,
                        question_id: 10,
                        text: format!("answer {order}"),
                        correct: order == 1,
                        order,
                        mooclet_explanation: None,
                    })
                    .unwrap();
            }
            for (id, text) in [(500, "squeeze theorem"), (501, "l'Hopital")] {
                catalog
                    .add_explanation(Explanation {
                        id,
                        text: text.to_string(),
                    })
                    .unwrap();
            }
            catalog.add_user(User { id: 7, name: "ada".to_string() }).unwrap();
            catalog.add_user(User { id: 8, name: "bob".to_string() }).unwrap();
            catalog
                .add_policy(Policy::new(1, "uniform_random").with_variables(["weight"]))
                .unwrap();
            let mooclet = Mooclet::new(1000, "why", "explanation", 1)
                .attached_to(OwnerRef::new(EntityTag::Answer, 100));
            catalog.add_mooclet(mooclet).unwrap();
            catalog
                .add_version(Version::new(1, 1000, "A").with_explanation(500))
                .unwrap();
            catalog
                .add_version(Version::new(2, 1000, "B").with_explanation(501))
                .unwrap();

            let measurements = Measurements::new(
                Arc::new(InMemoryMeasurementStore::new()),
                Arc::clone(catalog.resolver()),
                MeasurementConfig::default(),
            );
            let engine = DecisionEngine::new(
                catalog,
                measurements,
                Arc::new(PolicyRegistry::with_builtins().unwrap()),
            );
            let runner = SimulationRunner::new(
                engine,
                SimulationConfig {
                    default_iterations: 200,
                    diagnostic_iterations: 20,
                    workers: 2,
                    seed: Some(11),
                },
            );
            let lms = Arc::new(RecordingLms::default());
            let service = QuizService::new(runner, lms.clone())
                .with_survey_provisioner(Arc::new(FixedSurvey("https://survey.example")));
            Self { service, lms }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::Setup;

    #[test]
    fn provisioned_survey_url_is_stored_on_quiz() {
        let setup = Setup::new();
        let url = setup.service.provision_survey(1, 10).unwrap();
        assert_eq!(url, "https://survey.example/10");
        let quiz = setup.service.engine().catalog().quiz(1).unwrap();
        assert_eq!(quiz.url.as_deref(), Some("https://survey.example/10"));
    }

    #[test]
    fn provisioning_without_collaborator_is_a_gateway_error() {
        let setup = Setup::new();
        let bare = super::QuizService::new(setup.service.runner().clone(), setup.lms.clone());
        let err = bare.provision_survey(1, 10).unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("no survey provisioner"));
    }
}
