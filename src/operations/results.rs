//! Instructor-facing result tables.
//!
//! A [`ResultsMatrix`] has one row per version or answer and one column
//! per variable. Empty cells mean no value was recorded.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::entity::{EntityTag, RecordId};
use crate::error::{ExecutionError, MoocletResult, ValidationError};
use crate::measure::names::{MEAN_STUDENT_RATING, NUM_STUDENTS, RATING_STD_DEV, STUDENT_RATING};
use crate::measure::{Summary, Value, Variable};

use super::{BuiltinVariable, QuizService};

/// Rows of records against columns of variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsMatrix {
    /// Record id of each row.
    pub rows: Vec<RecordId>,
    pub variables: Vec<Variable>,
    /// `values[row][column]`; `None` where nothing is known.
    pub values: Vec<Vec<Option<f64>>>,
}

impl ResultsMatrix {
    /// The cell for `row` and the variable named `variable`.
    #[must_use]
    pub fn get(&self, row: RecordId, variable: &str) -> Option<f64> {
        let r = self.rows.iter().position(|&id| id == row)?;
        let c = self.variables.iter().position(|v| v.name == variable)?;
        self.values.get(r)?.get(c).copied().flatten()
    }
}

impl QuizService {
    /// Per-version results of a mooclet within a quiz.
    ///
    /// Rating aggregates are recomputed from the ratings given in `quiz`
    /// and stored back; when there are none the stored values are shown.
    pub fn mooclet_results(&self, quiz_id: RecordId, mooclet_id: RecordId) -> MoocletResult<ResultsMatrix> {
        let catalog = self.catalog();
        let measurements = self.measurements();
        let quiz = catalog.quiz(quiz_id)?;
        let mooclet = catalog.mooclet(mooclet_id)?;
        let versions = catalog.versions_of(mooclet.id)?;

        let variables = [
            BuiltinVariable::ExplanationProbability,
            BuiltinVariable::MeanStudentRating,
            BuiltinVariable::NumStudents,
            BuiltinVariable::RatingStdDev,
        ]
        .into_iter()
        .map(|v| self.builtin(v))
        .collect::<MoocletResult<Vec<_>>>()?;
        let rating = measurements.find_variable(STUDENT_RATING)?;

        let mut values = Vec::with_capacity(versions.len());
        for version in &versions {
            let summary = match &rating {
                Some(rating) => {
                    let context = Context::new().with(quiz.clone()).with(version.clone());
                    let samples: Vec<f64> = measurements
                        .query(rating, &context)?
                        .iter()
                        .map(|v| v.value)
                        .collect();
                    Summary::of(&samples)
                }
                None => None,
            };
            if let Some(summary) = &summary {
                self.store_summary(version.id, summary)?;
            }

            let mut row = Vec::with_capacity(variables.len());
            for variable in &variables {
                let recomputed = summary.map(|s| match variable.name.as_str() {
                    MEAN_STUDENT_RATING => Some(s.mean),
                    #[allow(clippy::cast_precision_loss)]
                    NUM_STUDENTS => Some(s.count as f64),
                    RATING_STD_DEV => Some(s.std_dev),
                    _ => None,
                });
                let cell = match recomputed.flatten() {
                    Some(value) => Some(value),
                    None => measurements.current_value(variable, Some(version.id), None)?,
                };
                row.push(cell);
            }
            values.push(row);
        }

        Ok(ResultsMatrix {
            rows: versions.iter().map(|v| v.id).collect(),
            variables,
            values,
        })
    }

    /// Per-answer values of every answer-scoped variable, narrowed to the
    /// quiz and question.
    pub fn question_results(&self, quiz_id: RecordId, question_id: RecordId) -> MoocletResult<ResultsMatrix> {
        let catalog = self.catalog();
        let measurements = self.measurements();
        let quiz = catalog.quiz(quiz_id)?;
        let question = catalog.question(question_id)?;
        let answers = catalog.answers_of(question.id)?;

        let variables: Vec<Variable> = measurements
            .variables()?
            .into_iter()
            .filter(|v| v.scope == Some(EntityTag::Answer))
            .collect();

        let mut values = Vec::with_capacity(answers.len());
        for answer in &answers {
            let context = Context::new()
                .with(quiz.clone())
                .with(question.clone())
                .with(answer.clone());
            let mut row = Vec::with_capacity(variables.len());
            for variable in &variables {
                let latest = measurements.query(variable, &context)?.pop();
                row.push(latest.map(|v| v.value));
            }
            values.push(row);
        }

        Ok(ResultsMatrix {
            rows: answers.iter().map(|a| a.id).collect(),
            variables,
            values,
        })
    }

    /// Version-scoped variables of the mooclet's policy, ascending by id.
    fn instructor_variables(&self, mooclet_id: RecordId) -> MoocletResult<Vec<Variable>> {
        let mooclet = self.catalog().mooclet(mooclet_id)?;
        let policy = self.catalog().policy(mooclet.policy_id)?;
        let mut variables = Vec::new();
        for name in &policy.variables {
            if let Some(variable) = self.measurements().find_variable(name)? {
                if variable.scope == Some(EntityTag::Version) {
                    variables.push(variable);
                }
            }
        }
        variables.sort_by_key(|v| v.id);
        Ok(variables)
    }

    /// Current instructor-set values of each version of a mooclet.
    ///
    /// `user` only matters for user variables.
    pub fn version_values(&self, mooclet_id: RecordId, user: Option<RecordId>) -> MoocletResult<ResultsMatrix> {
        let variables = self.instructor_variables(mooclet_id)?;
        let versions = self.catalog().versions_of(mooclet_id)?;
        let measurements = self.measurements();

        let mut values = Vec::with_capacity(versions.len());
        for version in &versions {
            let mut row = Vec::with_capacity(variables.len());
            for variable in &variables {
                let user = if variable.is_user_variable { user } else { None };
                row.push(measurements.current_value(variable, Some(version.id), user)?);
            }
            values.push(row);
        }
        Ok(ResultsMatrix {
            rows: versions.iter().map(|v| v.id).collect(),
            variables,
            values,
        })
    }

    /// Overwrites one instructor-set value of a version.
    pub fn set_version_value(
        &self,
        mooclet_id: RecordId,
        version_id: RecordId,
        variable: &str,
        value: f64,
        user: Option<RecordId>,
    ) -> MoocletResult<Value> {
        let version = self.catalog().version(version_id)?;
        if version.mooclet_id != mooclet_id {
            return Err(ValidationError::ContextMismatch {
                expected: mooclet_id,
                found: version.mooclet_id,
            }
            .into());
        }
        let variable = self
            .instructor_variables(mooclet_id)?
            .into_iter()
            .find(|v| v.name == variable)
            .ok_or_else(|| ExecutionError::not_found("variable", variable))?;
        self.measurements()
            .upsert_current(&variable, Some(version.id), value, user)
    }
}
