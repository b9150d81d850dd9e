//! Derived per-version and per-answer values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::context::Context;
use crate::entity::RecordId;
use crate::error::MoocletResult;
use crate::measure::names::{ANSWER_CHOICE_COUNT, STUDENT_RATING};
use crate::measure::Summary;
use crate::simulation::SimulationReport;

use super::{BuiltinVariable, QuizService};

/// What [`QuizService::update_intermediates`] recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediatesReport {
    pub version_id: RecordId,
    /// Summary of the version's ratings; absent when nobody rated it.
    pub ratings: Option<Summary>,
    pub simulation: SimulationReport,
    /// Share of choices per answer of the question.
    pub answer_proportions: BTreeMap<RecordId, f64>,
}

impl QuizService {
    /// Recomputes the derived values that follow a completed survey.
    ///
    /// Rating aggregates of the version, the selection probabilities of its
    /// mooclet and the answer proportions of the question are all rebuilt
    /// from raw values, so running this twice changes nothing.
    pub fn update_intermediates(
        &self,
        version_id: RecordId,
        question_id: RecordId,
    ) -> MoocletResult<IntermediatesReport> {
        let span = info_span!("update_intermediates", version_id, question_id);
        let _guard = span.enter();

        let catalog = self.catalog();
        let version = catalog.version(version_id)?;
        let question = catalog.question(question_id)?;
        let mooclet = catalog.mooclet(version.mooclet_id)?;

        let ratings = self.recompute_ratings(version.id)?;

        let context = Context::new().with(mooclet.clone());
        let simulation = self.runner.simulate_default(&mooclet, &context)?;

        let answer_proportions = self.recompute_answer_proportions(question.id)?;

        info!(
            rated = ratings.map_or(0, |s| s.count),
            answers = answer_proportions.len(),
            "intermediates updated"
        );
        Ok(IntermediatesReport {
            version_id: version.id,
            ratings,
            simulation,
            answer_proportions,
        })
    }

    /// Rewrites `num_students`, `mean_student_rating` and `rating_std_dev`
    /// of a version from its ratings. Nothing is written without ratings.
    pub(crate) fn recompute_ratings(&self, version_id: RecordId) -> MoocletResult<Option<Summary>> {
        let measurements = self.measurements();
        let Some(rating) = measurements.find_variable(STUDENT_RATING)? else {
            return Ok(None);
        };
        let samples: Vec<f64> = measurements
            .values_for(&rating, Some(version_id))?
            .iter()
            .map(|v| v.value)
            .collect();
        let Some(summary) = Summary::of(&samples) else {
            return Ok(None);
        };
        self.store_summary(version_id, &summary)?;
        Ok(Some(summary))
    }

    pub(crate) fn store_summary(&self, version_id: RecordId, summary: &Summary) -> MoocletResult<()> {
        let measurements = self.measurements();
        #[allow(clippy::cast_precision_loss)]
        let count = summary.count as f64;
        for (variable, value) in [
            (BuiltinVariable::NumStudents, count),
            (BuiltinVariable::MeanStudentRating, summary.mean),
            (BuiltinVariable::RatingStdDev, summary.std_dev),
        ] {
            let variable = self.builtin(variable)?;
            measurements.upsert_current(&variable, Some(version_id), value, None)?;
        }
        Ok(())
    }

    fn recompute_answer_proportions(
        &self,
        question_id: RecordId,
    ) -> MoocletResult<BTreeMap<RecordId, f64>> {
        let measurements = self.measurements();
        let answers = self.catalog().answers_of(question_id)?;
        let count_variable = measurements.find_variable(ANSWER_CHOICE_COUNT)?;

        let mut counts = Vec::with_capacity(answers.len());
        for answer in &answers {
            let count = match &count_variable {
                Some(variable) => measurements
                    .current_value(variable, Some(answer.id), None)?
                    .unwrap_or(0.0),
                None => 0.0,
            };
            counts.push((answer.id, count));
        }
        let total: f64 = counts.iter().map(|(_, c)| c).sum();

        let proportion_variable = self.builtin(BuiltinVariable::AnswerProportion)?;
        let mut proportions = BTreeMap::new();
        for (answer_id, count) in counts {
            let proportion = if total > 0.0 { count / total } else { 0.0 };
            measurements.upsert_current(&proportion_variable, Some(answer_id), proportion, None)?;
            proportions.insert(answer_id, proportion);
        }
        Ok(proportions)
    }
}
