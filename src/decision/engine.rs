//! The decision engine: resolves a mooclet's policy and asks the matching
//! strategy for a version.
//!
//! Selection reads the measurement store (weights, ratings) but never
//! writes to it. Callers that need reproducible draws pass their own RNG
//! through [`DecisionEngine::get_version_with_rng`]; everything else uses
//! the thread RNG.

use std::sync::Arc;

use rand::RngCore;
use tracing::debug;

use crate::catalog::Catalog;
use crate::context::Context;
use crate::entity::RecordId;
use crate::error::{ExecutionError, MoocletResult, ValidationError};
use crate::measure::Measurements;
use crate::policy::{PolicyRegistry, SelectionInput};

use super::model::{Mooclet, Version};

/// Chooses a version for a decision point by dispatching to the strategy
/// its policy names.
///
/// Selection never persists anything: recording what was shown and how it
/// went is the caller's job.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    catalog: Arc<Catalog>,
    measurements: Measurements,
    policies: Arc<PolicyRegistry>,
}

impl DecisionEngine {
    #[must_use]
    pub fn new(
        catalog: Arc<Catalog>,
        measurements: Measurements,
        policies: Arc<PolicyRegistry>,
    ) -> Self {
        Self {
            catalog,
            measurements,
            policies,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    #[must_use]
    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    #[must_use]
    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    /// The mooclet a context points at: its mooclet entry, else the
    /// explanation mooclet of its answer, else the mooclet of its version.
    fn referenced_mooclet(context: &Context) -> Option<RecordId> {
        if let Some(mooclet) = context.mooclet() {
            return Some(mooclet.id);
        }
        if let Some(id) = context.answer().and_then(|a| a.mooclet_explanation) {
            return Some(id);
        }
        context.version().map(|v| v.mooclet_id)
    }

    fn validate_context(mooclet: &Mooclet, context: &Context) -> Result<(), ValidationError> {
        match Self::referenced_mooclet(context) {
            Some(id) if id == mooclet.id => Ok(()),
            Some(found) => Err(ValidationError::ContextMismatch {
                expected: mooclet.id,
                found,
            }),
            None => Err(ValidationError::MissingMoocletContext {
                mooclet_id: mooclet.id,
            }),
        }
    }

    /// Derives the decision point from a context.
    pub fn resolve_mooclet(&self, context: &Context) -> MoocletResult<Mooclet> {
        let id = Self::referenced_mooclet(context).ok_or(ValidationError::NoMoocletInContext)?;
        self.catalog.mooclet(id)
    }

    /// Resolves the context's mooclet and selects a version for it.
    pub fn select(&self, context: &Context) -> MoocletResult<Version> {
        let mooclet = self.resolve_mooclet(context)?;
        self.get_version(&mooclet, context)
    }

    /// Selects a version of `mooclet` using the thread-local RNG.
    pub fn get_version(&self, mooclet: &Mooclet, context: &Context) -> MoocletResult<Version> {
        self.get_version_with_rng(mooclet, context, &mut rand::thread_rng())
    }

    /// Selects a version of `mooclet` drawing randomness from `rng`.
    ///
    /// # Errors
    /// - `ContextMismatch` / `MissingMoocletContext` if the context does not
    ///   point at `mooclet`
    /// - `EmptyDecisionSpace` if the mooclet has no versions
    /// - `UnknownPolicy` if no strategy is registered for its policy
    pub fn get_version_with_rng(
        &self,
        mooclet: &Mooclet,
        context: &Context,
        rng: &mut dyn RngCore,
    ) -> MoocletResult<Version> {
        Self::validate_context(mooclet, context)?;

        let versions = self.catalog.versions_of(mooclet.id)?;
        if versions.is_empty() {
            return Err(ExecutionError::EmptyDecisionSpace {
                mooclet_id: mooclet.id,
            }
            .into());
        }

        let policy = self.catalog.policy(mooclet.policy_id)?;
        let strategy = self
            .policies
            .get(&policy.name)?
            .ok_or_else(|| ExecutionError::UnknownPolicy {
                policy: policy.name.clone(),
            })?;

        let input = SelectionInput {
            mooclet,
            policy: &policy,
            versions: &versions,
            context,
            measurements: &self.measurements,
        };
        let chosen = strategy.select(&input, rng)?;
        debug!(
            mooclet_id = mooclet.id,
            policy = %policy.name,
            version_id = chosen.id,
            candidates = versions.len(),
            "selected version"
        );
        Ok(chosen.clone())
    }
}
