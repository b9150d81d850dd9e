//! Selection strategies and their registry.
//!
//! A [`Policy`] record names a strategy; the [`PolicyRegistry`] maps that
//! name to an implementation at dispatch time. New strategies are added with
//! [`PolicyRegistry::register`] without touching the decision engine.

mod thompson;
mod uniform;
mod weighted;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rand::RngCore;

use crate::context::Context;
use crate::decision::{Mooclet, Policy, Version};
use crate::error::{ExecutionError, MoocletError, MoocletResult};
use crate::measure::Measurements;
use crate::storage::lock_err;

pub use thompson::ThompsonSampling;
pub use uniform::UniformRandom;
pub use weighted::WeightedRandom;

/// Everything a strategy may look at when choosing.
#[derive(Debug, Clone, Copy)]
pub struct SelectionInput<'a> {
    pub mooclet: &'a Mooclet,
    pub policy: &'a Policy,
    /// Candidate versions, ascending by id. Never empty.
    pub versions: &'a [Version],
    pub context: &'a Context,
    pub measurements: &'a Measurements,
}

impl<'a> SelectionInput<'a> {
    /// Current value of a parameter variable owned by the policy.
    pub fn policy_parameter(&self, name: &str) -> MoocletResult<Option<f64>> {
        match self.measurements.find_variable(name)? {
            Some(variable) => self
                .measurements
                .current_value(&variable, Some(self.policy.id), None),
            None => Ok(None),
        }
    }

    /// A `PolicyFailed` error attributed to this policy.
    #[must_use]
    pub fn failure(&self, reason: impl Into<String>) -> MoocletError {
        ExecutionError::PolicyFailed {
            policy: self.policy.name.clone(),
            reason: reason.into(),
        }
        .into()
    }

    pub(crate) fn ensure_candidates(&self) -> MoocletResult<()> {
        if self.versions.is_empty() {
            return Err(ExecutionError::EmptyDecisionSpace {
                mooclet_id: self.mooclet.id,
            }
            .into());
        }
        Ok(())
    }
}

/// A named way of choosing one version.
///
/// Strategies may read parameter variables and historical values. They
/// must not assume exclusive write access to the store.
pub trait SelectionStrategy: Send + Sync {
    /// Name a [`Policy`] uses to refer to this strategy.
    fn name(&self) -> &str;

    fn select<'a>(
        &self,
        input: &SelectionInput<'a>,
        rng: &mut dyn RngCore,
    ) -> MoocletResult<&'a Version>;
}

/// Strategy lookup by policy name.
#[derive(Default)]
pub struct PolicyRegistry {
    strategies: RwLock<HashMap<String, Arc<dyn SelectionStrategy>>>,
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("names", &self.names().unwrap_or_default())
            .finish()
    }
}

impl PolicyRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `uniform_random`, `weighted_random` and
    /// `thompson_sampling`.
    pub fn with_builtins() -> MoocletResult<Self> {
        let registry = Self::new();
        registry.register(Arc::new(UniformRandom))?;
        registry.register(Arc::new(WeightedRandom))?;
        registry.register(Arc::new(ThompsonSampling::default()))?;
        Ok(registry)
    }

    /// Registers `strategy` under its name, returning any strategy it
    /// replaced.
    pub fn register(
        &self,
        strategy: Arc<dyn SelectionStrategy>,
    ) -> MoocletResult<Option<Arc<dyn SelectionStrategy>>> {
        let mut strategies = self
            .strategies
            .write()
            .map_err(|_| lock_err("policy.register"))?;
        Ok(strategies.insert(strategy.name().to_string(), strategy))
    }

    pub fn get(&self, name: &str) -> MoocletResult<Option<Arc<dyn SelectionStrategy>>> {
        let strategies = self.strategies.read().map_err(|_| lock_err("policy.get"))?;
        Ok(strategies.get(name).cloned())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> MoocletResult<Vec<String>> {
        let strategies = self.strategies.read().map_err(|_| lock_err("policy.names"))?;
        let mut names: Vec<String> = strategies.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
