//! Uniform choice among a mooclet's versions.

use rand::{Rng, RngCore};

use crate::decision::Version;
use crate::error::MoocletResult;

use super::{SelectionInput, SelectionStrategy};

/// Picks one of the currently available versions with equal probability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRandom;

impl SelectionStrategy for UniformRandom {
    fn name(&self) -> &str {
        "uniform_random"
    }

    fn select<'a>(
        &self,
        input: &SelectionInput<'a>,
        rng: &mut dyn RngCore,
    ) -> MoocletResult<&'a Version> {
        input.ensure_candidates()?;
        let index = rng.gen_range(0..input.versions.len());
        Ok(&input.versions[index])
    }
}
