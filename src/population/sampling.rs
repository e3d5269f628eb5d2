//! Fitness-proportional sampling without replacement.

use super::list::IndividualList;
use super::Genotype;
use crate::error::RankError;
use crate::fitness::FitnessFunction;
use crate::random::RandomSource;

const EPSILON: f64 = 1e-10;

/// Roulette-wheel draws of `k` distinct positions.
///
/// With `inverse = false`, weight grows with fitness (`f - min`); with
/// `inverse = true` it grows as fitness drops (`max - f`). Weights are
/// scaled by the fitness span and shifted by `ε`, so extreme but finite
/// values never overflow the wheel. Non-finite values get weight `ε`.
pub fn proportional_positions(values: &[f64], k: usize, inverse: bool, rng: &mut RandomSource) -> Vec<usize> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    // Halved before subtracting: `max - min` alone can overflow.
    let span = max / 2.0 - min / 2.0;

    let mut pool: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let gap = if !v.is_finite() || !(span > 0.0) {
                0.0
            } else if inverse {
                (max / 2.0 - v / 2.0) / span
            } else {
                (v / 2.0 - min / 2.0) / span
            };
            (i, gap + EPSILON)
        })
        .collect();

    let k = k.min(pool.len());
    let mut chosen = Vec::with_capacity(k);
    while chosen.len() < k {
        let total: f64 = pool.iter().map(|(_, w)| w).sum();
        let pick = if total.is_finite() && total > 0.0 {
            let mut roll = rng.uniform(0.0, total);
            let mut pick = pool.len() - 1;
            for (slot, (_, w)) in pool.iter().enumerate() {
                roll -= w;
                if roll <= 0.0 {
                    pick = slot;
                    break;
                }
            }
            pick
        } else {
            rng.index(pool.len())
        };
        chosen.push(pool.remove(pick).0);
    }
    chosen
}

impl<G: Genotype> IndividualList<G> {
    /// Positions of `k` distinct members drawn proportionally to fitness.
    pub fn proportional_selection<F>(
        &self,
        k: usize,
        fitness: &F,
        rng: &mut RandomSource,
    ) -> Result<Vec<usize>, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        let values = self.fitness_values(fitness)?;
        Ok(proportional_positions(&values, k, false, rng))
    }

    /// Positions of `k` distinct members drawn proportionally to badness.
    pub fn inverse_proportional_selection<F>(
        &self,
        k: usize,
        fitness: &F,
        rng: &mut RandomSource,
    ) -> Result<Vec<usize>, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        let values = self.fitness_values(fitness)?;
        Ok(proportional_positions(&values, k, true, rng))
    }
}
