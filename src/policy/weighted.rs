//! Weighted random selection.

use rand::distributions::{Distribution, WeightedIndex};
use rand::RngCore;

use crate::decision::Version;
use crate::error::MoocletResult;
use crate::measure::names::WEIGHT;

use super::{SelectionInput, SelectionStrategy};

/// Picks versions in proportion to their instructor-set `weight`.
///
/// A version without a weight value counts as weight 0. Negative weights or
/// all-zero weights fail the selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedRandom;

impl SelectionStrategy for WeightedRandom {
    fn name(&self) -> &str {
        "weighted_random"
    }

    fn select<'a>(
        &self,
        input: &SelectionInput<'a>,
        rng: &mut dyn RngCore,
    ) -> MoocletResult<&'a Version> {
        input.ensure_candidates()?;
        let Some(variable) = input.measurements.find_variable(WEIGHT)? else {
            return Err(input.failure("no version has a weight"));
        };

        let mut weights = Vec::with_capacity(input.versions.len());
        for version in input.versions {
            let weight = input
                .measurements
                .current_value(&variable, Some(version.id), None)?
                .unwrap_or(0.0);
            weights.push(weight);
        }

        let index = WeightedIndex::new(&weights)
            .map_err(|e| input.failure(format!("invalid version weights {weights:?}: {e}")))?;
        Ok(&input.versions[index.sample(rng)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityTag;
    use crate::measure::{RecordMode, VariableSpec};
    use crate::policy::test_support::Fixture;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn set_weights(fixture: &Fixture, weights: &[(u64, f64)]) {
        let var = fixture
            .measurements
            .get_or_create_variable(
                VariableSpec::new(WEIGHT)
                    .scope(EntityTag::Version)
                    .mode(RecordMode::Aggregate),
            )
            .unwrap();
        for &(version, w) in weights {
            fixture.measurements.write(&var, Some(version), w, None).unwrap();
        }
    }

    #[test]
    fn zero_weight_version_is_never_chosen() {
        let fixture = Fixture::new("weighted_random", 3);
        set_weights(&fixture, &[(1, 1.0), (2, 0.0), (3, 3.0)]);

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut counts = [0usize; 3];
        for _ in 0..400 {
            let v = WeightedRandom.select(&fixture.input(), &mut rng).unwrap();
            counts[(v.id - 1) as usize] += 1;
        }
        assert_eq!(counts[1], 0);
        assert!(counts[2] > counts[0], "{counts:?}");
    }

    #[test]
    fn missing_or_zero_weights_fail() {
        let fixture = Fixture::new("weighted_random", 2);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = WeightedRandom.select(&fixture.input(), &mut rng).unwrap_err();
        assert!(err.to_string().contains("weighted_random"));

        set_weights(&fixture, &[(1, 0.0)]);
        assert!(WeightedRandom.select(&fixture.input(), &mut rng).is_err());
    }

    #[test]
    fn latest_weight_wins() {
        let fixture = Fixture::new("weighted_random", 2);
        set_weights(&fixture, &[(1, 5.0), (2, 1.0), (2, 0.0)]);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let v = WeightedRandom.select(&fixture.input(), &mut rng).unwrap();
            assert_eq!(v.id, 1);
        }
    }
}
