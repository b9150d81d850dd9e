//! Entity catalog.
//!
//! One typed repository per built-in entity kind, the mooclet type table,
//! and the [`AssociationResolver`] that lets measurements and contexts
//! refer to any of them by tag.

mod repository;
mod resolver;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::decision::{Mooclet, MoocletType, Policy, Version};
use crate::entity::{Answer, Course, EntityTag, Explanation, OwnerRef, Question, Quiz, RecordId, User};
use crate::error::{ExecutionError, MoocletResult, ValidationError};
use crate::storage::lock_err;

pub use repository::{CatalogRecord, EntityRepository, InMemoryRepository};
pub use resolver::AssociationResolver;

fn fetch<T: CatalogRecord>(repo: &InMemoryRepository<T>, id: RecordId) -> MoocletResult<T> {
    repo.get(id)?
        .ok_or_else(|| ExecutionError::not_found(T::tag().as_str(), id).into())
}

/// Content and decision records plus the resolver over them.
#[derive(Debug)]
pub struct Catalog {
    courses: Arc<InMemoryRepository<Course>>,
    quizzes: Arc<InMemoryRepository<Quiz>>,
    questions: Arc<InMemoryRepository<Question>>,
    answers: Arc<InMemoryRepository<Answer>>,
    explanations: Arc<InMemoryRepository<Explanation>>,
    mooclets: Arc<InMemoryRepository<Mooclet>>,
    versions: Arc<InMemoryRepository<Version>>,
    policies: Arc<InMemoryRepository<Policy>>,
    users: Arc<InMemoryRepository<User>>,
    mooclet_types: RwLock<HashMap<String, MoocletType>>,
    resolver: Arc<AssociationResolver>,
}

impl Catalog {
    /// Creates an empty catalog with every built-in kind registered in the
    /// resolver and the `explanation` mooclet type declared.
    pub fn new() -> MoocletResult<Self> {
        let catalog = Self {
            courses: Arc::default(),
            quizzes: Arc::default(),
            questions: Arc::default(),
            answers: Arc::default(),
            explanations: Arc::default(),
            mooclets: Arc::default(),
            versions: Arc::default(),
            policies: Arc::default(),
            users: Arc::default(),
            mooclet_types: RwLock::new(HashMap::new()),
            resolver: Arc::new(AssociationResolver::new()),
        };

        let repositories: [Arc<dyn EntityRepository>; 9] = [
            catalog.courses.clone(),
            catalog.quizzes.clone(),
            catalog.questions.clone(),
            catalog.answers.clone(),
            catalog.explanations.clone(),
            catalog.mooclets.clone(),
            catalog.versions.clone(),
            catalog.policies.clone(),
            catalog.users.clone(),
        ];
        for repo in repositories {
            catalog.resolver.register(repo)?;
        }
        catalog.add_mooclet_type(MoocletType::explanation())?;
        Ok(catalog)
    }

    /// Shared resolver over every registered kind.
    #[must_use]
    pub fn resolver(&self) -> &Arc<AssociationResolver> {
        &self.resolver
    }

    pub fn add_course(&self, course: Course) -> MoocletResult<()> {
        Ok(self.courses.insert(course)?)
    }

    pub fn add_quiz(&self, quiz: Quiz) -> MoocletResult<()> {
        Ok(self.quizzes.insert(quiz)?)
    }

    pub fn add_question(&self, question: Question) -> MoocletResult<()> {
        fetch(&self.quizzes, question.quiz_id)?;
        Ok(self.questions.insert(question)?)
    }

    pub fn add_answer(&self, answer: Answer) -> MoocletResult<()> {
        fetch(&self.questions, answer.question_id)?;
        Ok(self.answers.insert(answer)?)
    }

    pub fn add_explanation(&self, explanation: Explanation) -> MoocletResult<()> {
        Ok(self.explanations.insert(explanation)?)
    }

    pub fn add_user(&self, user: User) -> MoocletResult<()> {
        Ok(self.users.insert(user)?)
    }

    pub fn add_policy(&self, policy: Policy) -> MoocletResult<()> {
        Ok(self.policies.insert(policy)?)
    }

    pub fn add_mooclet_type(&self, mooclet_type: MoocletType) -> MoocletResult<()> {
        let mut types = self
            .mooclet_types
            .write()
            .map_err(|_| lock_err("catalog.mooclet_types"))?;
        types.insert(mooclet_type.name.clone(), mooclet_type);
        Ok(())
    }

    pub fn mooclet_type(&self, name: &str) -> MoocletResult<MoocletType> {
        let types = self
            .mooclet_types
            .read()
            .map_err(|_| lock_err("catalog.mooclet_types"))?;
        types
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutionError::not_found("mooclet type", name).into())
    }

    /// Adds a decision point.
    ///
    /// The parent's tag must be the one its type declares (or absent when
    /// the type declares none) and the parent must exist. A mooclet attached
    /// under an answer without an explanation mooclet becomes that answer's
    /// explanation mooclet.
    pub fn add_mooclet(&self, mooclet: Mooclet) -> MoocletResult<()> {
        let mooclet_type = self.mooclet_type(&mooclet.type_name)?;
        let actual = mooclet.parent.as_ref().map(|p| p.tag.clone());
        if actual != mooclet_type.parent_tag {
            return Err(ValidationError::ParentMismatch {
                mooclet_type: mooclet_type.name,
                expected: mooclet_type.parent_tag,
                actual,
            }
            .into());
        }
        fetch(&self.policies, mooclet.policy_id)?;
        if let Some(parent) = &mooclet.parent {
            self.resolver.resolve(parent)?;
        }

        let id = mooclet.id;
        let parent = mooclet.parent.clone();
        self.mooclets.insert(mooclet)?;
        if let Some(OwnerRef {
            tag: EntityTag::Answer,
            id: answer_id,
        }) = parent
        {
            let linked = self.answers.modify(answer_id, |answer| {
                if answer.mooclet_explanation.is_none() {
                    answer.mooclet_explanation = Some(id);
                    true
                } else {
                    false
                }
            })?;
            if linked {
                debug!(mooclet_id = id, answer_id, "linked explanation mooclet to answer");
            }
        }
        Ok(())
    }

    pub fn add_version(&self, version: Version) -> MoocletResult<()> {
        fetch(&self.mooclets, version.mooclet_id)?;
        if let Some(content) = &version.content {
            self.resolver.resolve(content)?;
        }
        Ok(self.versions.insert(version)?)
    }

    pub fn course(&self, id: RecordId) -> MoocletResult<Course> {
        fetch(&self.courses, id)
    }

    pub fn quiz(&self, id: RecordId) -> MoocletResult<Quiz> {
        fetch(&self.quizzes, id)
    }

    pub fn question(&self, id: RecordId) -> MoocletResult<Question> {
        fetch(&self.questions, id)
    }

    pub fn answer(&self, id: RecordId) -> MoocletResult<Answer> {
        fetch(&self.answers, id)
    }

    pub fn explanation(&self, id: RecordId) -> MoocletResult<Explanation> {
        fetch(&self.explanations, id)
    }

    pub fn user(&self, id: RecordId) -> MoocletResult<User> {
        fetch(&self.users, id)
    }

    pub fn mooclet(&self, id: RecordId) -> MoocletResult<Mooclet> {
        fetch(&self.mooclets, id)
    }

    pub fn version(&self, id: RecordId) -> MoocletResult<Version> {
        fetch(&self.versions, id)
    }

    pub fn policy(&self, id: RecordId) -> MoocletResult<Policy> {
        fetch(&self.policies, id)
    }

    /// Versions of a mooclet, ascending by id.
    pub fn versions_of(&self, mooclet_id: RecordId) -> MoocletResult<Vec<Version>> {
        Ok(self.versions.filter(|v| v.mooclet_id == mooclet_id)?)
    }

    /// Answers of a question in display order.
    pub fn answers_of(&self, question_id: RecordId) -> MoocletResult<Vec<Answer>> {
        let mut answers = self.answers.filter(|a| a.question_id == question_id)?;
        answers.sort_by_key(|a| (a.order, a.id));
        Ok(answers)
    }

    /// Mooclets attached under `parent`.
    pub fn mooclets_under(&self, parent: &OwnerRef) -> MoocletResult<Vec<Mooclet>> {
        Ok(self.mooclets.filter(|m| m.parent.as_ref() == Some(parent))?)
    }

    /// Stores the externally hosted survey URL of a quiz.
    pub fn set_quiz_url(&self, quiz_id: RecordId, url: String) -> MoocletResult<()> {
        self.quizzes.modify(quiz_id, |quiz| quiz.url = Some(url))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let catalog = Catalog::new().unwrap();
        catalog.add_quiz(Quiz::new(1, "Limits")).unwrap();
        catalog
            .add_question(Question {
                id: 1,
                quiz_id: 1,
                text: "lim x->0 sin(x)/x".to_string(),
            })
            .unwrap();
        for (id, order) in [(10, 2), (11, 1)] {
            catalog
                .add_answer(Answer {
                    id,
                    question_id: 1,
                    text: format!("answer {id}"),
                    correct: id == 11,
                    order,
                    mooclet_explanation: None,
                })
                .unwrap();
        }
        catalog.add_policy(Policy::new(1, "uniform_random")).unwrap();
        catalog
    }

    #[test]
    fn answers_come_back_in_display_order() {
        let catalog = catalog();
        let ids: Vec<RecordId> = catalog.answers_of(1).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[test]
    fn explanation_mooclet_links_to_its_answer() {
        let catalog = catalog();
        catalog
            .add_mooclet(
                Mooclet::new(5, "why", "explanation", 1)
                    .attached_to(OwnerRef::new(EntityTag::Answer, 10)),
            )
            .unwrap();
        assert_eq!(catalog.answer(10).unwrap().mooclet_explanation, Some(5));
        assert_eq!(
            catalog
                .mooclets_under(&OwnerRef::new(EntityTag::Answer, 10))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn parent_must_match_declared_type() {
        let catalog = catalog();
        let err = catalog
            .add_mooclet(
                Mooclet::new(5, "why", "explanation", 1)
                    .attached_to(OwnerRef::new(EntityTag::Question, 1)),
            )
            .unwrap_err();
        assert!(err.is_validation());

        let err = catalog
            .add_mooclet(Mooclet::new(6, "floating", "explanation", 1))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn untyped_parentless_mooclet_is_accepted() {
        let catalog = catalog();
        catalog
            .add_mooclet_type(MoocletType::new("standalone", None))
            .unwrap();
        catalog
            .add_mooclet(Mooclet::new(7, "banner", "standalone", 1))
            .unwrap();
        assert!(catalog.mooclet(7).is_ok());
    }

    #[test]
    fn versions_require_their_mooclet() {
        let catalog = catalog();
        let err = catalog.add_version(Version::new(1, 42, "A")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn quiz_url_is_stored() {
        let catalog = catalog();
        catalog
            .set_quiz_url(1, "https://survey.example/q1".to_string())
            .unwrap();
        assert_eq!(
            catalog.quiz(1).unwrap().url.as_deref(),
            Some("https://survey.example/q1")
        );
        assert!(catalog.set_quiz_url(2, String::new()).is_err());
    }
}
