//! Thompson sampling with a Beta prior per version.
//!
//! The Beta draw is built from two Gamma draws, so only `rand`'s uniform
//! source is needed.

use rand::{Rng, RngCore};
use tracing::debug;

use crate::decision::Version;
use crate::error::MoocletResult;
use crate::measure::names::{PRIOR_ALPHA, PRIOR_BETA, REWARD_THRESHOLD, STUDENT_RATING};

use super::{SelectionInput, SelectionStrategy};

const MAX_GAMMA_ITERATIONS: usize = 1000;

/// Beta-Bernoulli Thompson sampling over student ratings.
///
/// A version's successes are its `student_rating` values at or above the
/// policy's `reward_threshold`; the rest are failures. Each version draws
/// from `Beta(prior_alpha + successes, prior_beta + failures)` and the
/// highest draw wins.
#[derive(Debug, Clone, Copy)]
pub struct ThompsonSampling {
    pub default_threshold: f64,
    pub default_prior: (f64, f64),
}

impl Default for ThompsonSampling {
    fn default() -> Self {
        Self {
            default_threshold: 4.0,
            default_prior: (1.0, 1.0),
        }
    }
}

impl ThompsonSampling {
    fn sample_beta(rng: &mut dyn RngCore, alpha: f64, beta: f64) -> f64 {
        let x = Self::sample_gamma(rng, alpha);
        let y = Self::sample_gamma(rng, beta);
        if x + y == 0.0 {
            return 0.5;
        }
        x / (x + y)
    }

    /// Marsaglia-Tsang, with the shape < 1 boost.
    fn sample_gamma(rng: &mut dyn RngCore, shape: f64) -> f64 {
        if shape < 1.0 {
            let u: f64 = rng.gen();
            return Self::sample_gamma(rng, shape + 1.0) * u.powf(1.0 / shape);
        }

        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        for _ in 0..MAX_GAMMA_ITERATIONS {
            let z = Self::standard_normal(rng);
            let v = (1.0 + c * z).powi(3);
            if v <= 0.0 {
                continue;
            }
            let u: f64 = rng.gen();
            let z2 = z * z;
            if u < 1.0 - 0.0331 * z2 * z2 || u.ln() < 0.5 * z2 + d * (1.0 - v + v.ln()) {
                return d * v;
            }
        }
        d
    }

    /// Box-Muller.
    fn standard_normal(rng: &mut dyn RngCore) -> f64 {
        let u1: f64 = rng.gen::<f64>().max(1e-10);
        let u2: f64 = rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

impl SelectionStrategy for ThompsonSampling {
    fn name(&self) -> &str {
        "thompson_sampling"
    }

    fn select<'a>(
        &self,
        input: &SelectionInput<'a>,
        rng: &mut dyn RngCore,
    ) -> MoocletResult<&'a Version> {
        input.ensure_candidates()?;
        let threshold = input
            .policy_parameter(REWARD_THRESHOLD)?
            .unwrap_or(self.default_threshold);
        let alpha = input
            .policy_parameter(PRIOR_ALPHA)?
            .unwrap_or(self.default_prior.0);
        let beta = input
            .policy_parameter(PRIOR_BETA)?
            .unwrap_or(self.default_prior.1);
        if alpha <= 0.0 || beta <= 0.0 {
            return Err(input.failure(format!(
                "priors must be positive (alpha={alpha}, beta={beta})"
            )));
        }

        let ratings = input.measurements.find_variable(STUDENT_RATING)?;
        let mut best: Option<(f64, &'a Version)> = None;
        for version in input.versions {
            let (mut successes, mut failures) = (0.0, 0.0);
            if let Some(ratings) = &ratings {
                for value in input.measurements.values_for(ratings, Some(version.id))? {
                    if value.value >= threshold {
                        successes += 1.0;
                    } else {
                        failures += 1.0;
                    }
                }
            }
            let draw = Self::sample_beta(rng, alpha + successes, beta + failures);
            debug!(version_id = version.id, successes, failures, draw, "thompson draw");
            if best.map_or(true, |(top, _)| draw > top) {
                best = Some((draw, version));
            }
        }
        best.map(|(_, version)| version)
            .ok_or_else(|| input.failure("no candidate produced a draw"))
    }
}
