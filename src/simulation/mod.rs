//! Monte-Carlo estimate of a decision point's selection distribution.
//!
//! The runner treats the decision engine as a black box: it asks for a
//! version `iterations` times against a fixed context and reports how often
//! each version came back. No closed-form shortcut is taken, so adaptive
//! strategies are measured exactly as they behave.

mod pool;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};
use uuid::Uuid;

use crate::config::SimulationConfig;
use crate::context::Context;
use crate::decision::{DecisionEngine, Mooclet};
use crate::entity::{EntityTag, RecordId};
use crate::error::{MoocletResult, ValidationError};
use crate::measure::names::EXPLANATION_PROBABILITY;
use crate::measure::{RecordMode, VariableSpec};

/// Identifier of one simulation run, for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationRunId(Uuid);

impl SimulationRunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SimulationRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SimulationRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: SimulationRunId,
    pub mooclet_id: RecordId,
    pub iterations: usize,
    /// Times each version was chosen. Every version of the mooclet is
    /// present.
    pub counts: BTreeMap<RecordId, usize>,
    /// `counts / iterations`.
    pub frequencies: BTreeMap<RecordId, f64>,
}

impl SimulationReport {
    /// Frequency of `version_id`, 0.0 if it is not a version of the mooclet.
    #[must_use]
    pub fn frequency(&self, version_id: RecordId) -> f64 {
        self.frequencies.get(&version_id).copied().unwrap_or(0.0)
    }
}

/// Runs simulations over a [`DecisionEngine`].
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    engine: DecisionEngine,
    config: SimulationConfig,
}

impl SimulationRunner {
    #[must_use]
    pub fn new(engine: DecisionEngine, config: SimulationConfig) -> Self {
        Self { engine, config }
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Estimates the selection distribution without storing it.
    pub fn estimate(
        &self,
        mooclet: &Mooclet,
        context: &Context,
        iterations: usize,
    ) -> MoocletResult<SimulationReport> {
        if iterations == 0 {
            return Err(ValidationError::ZeroIterations.into());
        }
        let run_id = SimulationRunId::new();
        let span = info_span!("simulation", %run_id, mooclet_id = mooclet.id, iterations);
        let _guard = span.enter();

        let tally = pool::run_trials(iterations, self.config.workers, self.config.seed, |rng| {
            self.engine
                .get_version_with_rng(mooclet, context, rng)
                .map(|v| v.id)
        })?;

        let mut counts: BTreeMap<RecordId, usize> = self
            .engine
            .catalog()
            .versions_of(mooclet.id)?
            .into_iter()
            .map(|v| (v.id, 0))
            .collect();
        for (id, n) in tally {
            *counts.entry(id).or_insert(0) += n;
        }
        #[allow(clippy::cast_precision_loss)]
        let frequencies = counts
            .iter()
            .map(|(&id, &n)| (id, n as f64 / iterations as f64))
            .collect();

        info!(versions = counts.len(), "simulation finished");
        Ok(SimulationReport {
            run_id,
            mooclet_id: mooclet.id,
            iterations,
            counts,
            frequencies,
        })
    }

    /// Estimates the selection distribution and stores each version's
    /// frequency as its current `explanation_probability`.
    pub fn simulate_probabilities(
        &self,
        mooclet: &Mooclet,
        context: &Context,
        iterations: usize,
    ) -> MoocletResult<SimulationReport> {
        let report = self.estimate(mooclet, context, iterations)?;

        let measurements = self.engine.measurements();
        let variable = measurements.get_or_create_variable(
            VariableSpec::new(EXPLANATION_PROBABILITY)
                .display_name("Explanation Probability")
                .scope(EntityTag::Version)
                .mode(RecordMode::Aggregate),
        )?;
        for (&version_id, &frequency) in &report.frequencies {
            measurements.upsert_current(&variable, Some(version_id), frequency, None)?;
        }
        Ok(report)
    }

    /// [`simulate_probabilities`](Self::simulate_probabilities) with the
    /// configured scheduled iteration count.
    pub fn simulate_default(
        &self,
        mooclet: &Mooclet,
        context: &Context,
    ) -> MoocletResult<SimulationReport> {
        self.simulate_probabilities(mooclet, context, self.config.default_iterations)
    }

    /// [`simulate_probabilities`](Self::simulate_probabilities) with the
    /// configured diagnostic iteration count.
    pub fn simulate_diagnostic(
        &self,
        mooclet: &Mooclet,
        context: &Context,
    ) -> MoocletResult<SimulationReport> {
        self.simulate_probabilities(mooclet, context, self.config.diagnostic_iterations)
    }
}
