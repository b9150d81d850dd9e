//! Rating, grade and free-form value submission.
//!
//! Grades go to the LMS after they are stored. Previews skip both.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entity::{EntityTag, RecordId};
use crate::error::{MoocletError, MoocletResult};
use crate::measure::{parse_measurement, Value, VariableSpec};

use super::{BuiltinVariable, Outcome, QuizService};

/// Parameter names that carry request metadata rather than measurements.
pub const RESERVED_PARAMS: [&str; 5] = ["token", "user_id", "content_type", "object_id", "quizsource"];

/// How many submitted parameters were stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCounts {
    pub saved: usize,
    /// Parameters that were not numbers or not valid variable names.
    pub unsaved: usize,
}

impl QuizService {
    /// Appends a student's rating of the version they were shown.
    pub fn submit_rating(
        &self,
        version_id: RecordId,
        user_id: RecordId,
        rating: f64,
    ) -> MoocletResult<Value> {
        let version = self.catalog().version(version_id)?;
        let user = self.catalog().user(user_id)?;
        let variable = self.builtin(BuiltinVariable::StudentRating)?;
        let value = self
            .measurements()
            .record(&variable, version.id, rating, Some(user.id))?;
        debug!(version_id, user_id, rating, "rating recorded");
        Ok(value)
    }

    /// Stores a quiz grade and passes it back to the LMS.
    ///
    /// Instructor previews store nothing and send nothing.
    pub fn submit_quiz_grade(
        &self,
        user_id: RecordId,
        quiz_id: RecordId,
        grade: f64,
        preview: bool,
    ) -> MoocletResult<Outcome<Value>> {
        if preview {
            debug!(user_id, quiz_id, "preview grade skipped");
            return Ok(Outcome::PreviewSkipped);
        }
        let user = self.catalog().user(user_id)?;
        let quiz = self.catalog().quiz(quiz_id)?;
        let variable = self.builtin(BuiltinVariable::QuizGrade)?;
        let value = self
            .measurements()
            .write(&variable, Some(quiz.id), grade, Some(user.id))?;
        self.lms.grade_passback(grade, &user, &quiz)?;
        info!(user_id, quiz_id, grade, "quiz grade submitted");
        Ok(Outcome::Saved(value))
    }

    /// Stores every numeric, non-reserved parameter as a user variable
    /// value.
    ///
    /// Variables are created on first use with the given scope. Parameters
    /// whose value is not a number are counted as unsaved and skipped.
    pub fn submit_values<K, V>(
        &self,
        user_id: RecordId,
        scope: Option<EntityTag>,
        owner_id: Option<RecordId>,
        params: &[(K, V)],
        preview: bool,
    ) -> MoocletResult<Outcome<SubmissionCounts>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if preview {
            return Ok(Outcome::PreviewSkipped);
        }
        let user = self.catalog().user(user_id)?;
        let measurements = self.measurements();

        let mut counts = SubmissionCounts::default();
        for (name, raw) in params {
            let name = name.as_ref();
            if RESERVED_PARAMS.contains(&name) {
                continue;
            }
            let Ok(number) = parse_measurement(raw.as_ref()) else {
                counts.unsaved += 1;
                continue;
            };
            let mut spec = VariableSpec::new(name).user_variable(true);
            if let Some(scope) = &scope {
                spec = spec.scope(scope.clone());
            }
            let variable = match measurements.get_or_create_variable(spec) {
                Ok(variable) => variable,
                Err(MoocletError::Validation(_)) => {
                    counts.unsaved += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            match owner_id {
                Some(owner) => measurements.record(&variable, owner, number, Some(user.id))?,
                None => measurements.record_unowned(&variable, number, Some(user.id))?,
            };
            counts.saved += 1;
        }
        info!(user_id, saved = counts.saved, unsaved = counts.unsaved, "values submitted");
        Ok(Outcome::Saved(counts))
    }
}
