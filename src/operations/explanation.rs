//! Explanation selection for a chosen answer.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::entity::RecordId;
use crate::error::{MoocletResult, ValidationError};

use super::{BuiltinVariable, QuizService};

/// The explanation picked for a student's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationChoice {
    pub version_id: RecordId,
    /// Absent when the version's content is not an explanation.
    pub explanation_id: Option<RecordId>,
    pub text: Option<String>,
}

impl QuizService {
    /// Chooses the explanation to show after a student picks an answer.
    ///
    /// `answer_choice` is 1-based over the question's answers in display
    /// order. The chosen answer's `answer_choice_count` goes up by one.
    pub fn select_explanation(
        &self,
        question_id: RecordId,
        answer_choice: usize,
        user_id: Option<RecordId>,
    ) -> MoocletResult<ExplanationChoice> {
        let catalog = self.catalog();
        let question = catalog.question(question_id)?;
        let answers = catalog.answers_of(question.id)?;
        let answer = answer_choice
            .checked_sub(1)
            .and_then(|idx| answers.get(idx))
            .ok_or(ValidationError::AnswerChoiceOutOfRange {
                choice: answer_choice,
                available: answers.len(),
            })?;
        let mooclet_id = answer
            .mooclet_explanation
            .ok_or(ValidationError::MissingExplanationMooclet {
                answer_id: answer.id,
            })?;
        let mooclet = catalog.mooclet(mooclet_id)?;

        let mut context = Context::new().with(mooclet.clone());
        if let Some(user_id) = user_id {
            context.insert(catalog.user(user_id)?);
        }
        let version = self.engine().get_version(&mooclet, &context)?;

        let count = self.builtin(BuiltinVariable::AnswerChoiceCount)?;
        let measurements = self.measurements();
        let previous = measurements
            .current_value(&count, Some(answer.id), None)?
            .unwrap_or(0.0);
        measurements.upsert_current(&count, Some(answer.id), previous + 1.0, None)?;

        let explanation = match version.explanation_id() {
            Some(id) => Some(catalog.explanation(id)?),
            None => None,
        };
        debug!(
            question_id,
            answer_id = answer.id,
            version_id = version.id,
            "explanation selected"
        );
        Ok(ExplanationChoice {
            version_id: version.id,
            explanation_id: explanation.as_ref().map(|e| e.id),
            text: explanation.map(|e| e.text),
        })
    }
}
