//! Tie-aware rank queries.
//!
//! Rank `r` is the `r`-th position in the descending-fitness order of a
//! list. Individuals with equal fitness form a *tie block* and share every
//! rank in the block, so a rank query returns the whole block.
//!
//! The general case is a randomized three-way quickselect over a fitness
//! cache built once per call. Ranks 1 and `len` take a single linear scan.
//! Blocks are returned in list order whatever pivots were drawn, which makes
//! [`IndividualList::individual_with_rank`] deterministic.

use std::cmp::Ordering;

use super::list::{IndividualList, IndividualRef};
use super::Genotype;
use crate::error::RankError;
use crate::fitness::{ensure_single_objective, fitness_of, FitnessFunction};
use crate::random::RandomSource;

/// Total order on fitness values. NaN ranks below every number.
pub fn compare_fitness(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Positions of the tie block containing descending rank `rank` (1-based).
///
/// Three-way quickselect: pick a random pivot, split the working set into
/// strictly better / equal / strictly worse, and either return the equal
/// block or continue in the part that contains the rank.
pub fn rank_block(values: &[f64], rank: usize, rng: &mut RandomSource) -> Result<Vec<usize>, RankError> {
    if rank == 0 || rank > values.len() {
        return Err(RankError::RankOutOfRange {
            rank,
            size: values.len(),
        });
    }

    let mut working: Vec<usize> = (0..values.len()).collect();
    let mut rank = rank;
    loop {
        if working.is_empty() {
            return Err(RankError::EmptyPopulation);
        }
        let pivot = values[working[rng.index(working.len())]];

        let mut large = Vec::new();
        let mut equal = Vec::new();
        let mut small = Vec::new();
        for &i in &working {
            match compare_fitness(values[i], pivot) {
                Ordering::Greater => large.push(i),
                Ordering::Equal => equal.push(i),
                Ordering::Less => small.push(i),
            }
        }

        if rank <= large.len() {
            working = large;
        } else if rank <= large.len() + equal.len() {
            return Ok(equal);
        } else {
            rank -= large.len() + equal.len();
            working = small;
        }
    }
}

/// Positions tied for the best (`best = true`) or worst value, in one scan.
pub fn extreme_block(values: &[f64], best: bool) -> Vec<usize> {
    let wanted = if best {
        Ordering::Greater
    } else {
        Ordering::Less
    };
    let mut block = Vec::new();
    let mut current: Option<f64> = None;
    for (i, &v) in values.iter().enumerate() {
        match current {
            None => {
                current = Some(v);
                block.push(i);
            }
            Some(c) => {
                let ord = compare_fitness(v, c);
                if ord == wanted {
                    current = Some(v);
                    block.clear();
                    block.push(i);
                } else if ord == Ordering::Equal {
                    block.push(i);
                }
            }
        }
    }
    block
}

impl<G: Genotype> IndividualList<G> {
    /// Single-objective fitness of every member, in list order.
    ///
    /// Each member is evaluated once per call (with `parallel`, across the
    /// rayon pool), so expensive or noisy functions see a consistent snapshot.
    pub fn fitness_values<F>(&self, fitness: &F) -> Result<Vec<f64>, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        ensure_single_objective(fitness)?;
        let first = |m: &IndividualRef<G>| {
            fitness_of(fitness, m, self)
                .first()
                .copied()
                .unwrap_or(f64::NAN)
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            Ok(self.as_slice().par_iter().map(first).collect())
        }

        #[cfg(not(feature = "parallel"))]
        {
            Ok(self.iter().map(first).collect())
        }
    }

    /// Every member that could occupy descending rank `rank` (1-based).
    pub fn all_with_rank<F>(
        &self,
        rank: usize,
        fitness: &F,
        rng: &mut RandomSource,
    ) -> Result<IndividualList<G>, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        ensure_single_objective(fitness)?;
        if self.is_empty() {
            return Err(RankError::EmptyPopulation);
        }
        let n = self.len();
        if rank == 0 || rank > n {
            return Err(RankError::RankOutOfRange { rank, size: n });
        }

        let values = self.fitness_values(fitness)?;
        let block = if rank == 1 {
            extreme_block(&values, true)
        } else if rank == n {
            extreme_block(&values, false)
        } else {
            rank_block(&values, rank, rng)?
        };
        Ok(self.pick(&block))
    }

    /// The first member (in list order) of the tie block at `rank`.
    pub fn individual_with_rank<F>(
        &self,
        rank: usize,
        fitness: &F,
        rng: &mut RandomSource,
    ) -> Result<IndividualRef<G>, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        self.all_with_rank(rank, fitness, rng)?
            .get(0)
            .cloned()
            .ok_or(RankError::EmptyPopulation)
    }

    /// Members tied for the best fitness.
    pub fn elitists<F>(&self, fitness: &F) -> Result<IndividualList<G>, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        self.extremes(fitness, true)
    }

    /// Members tied for the worst fitness.
    pub fn losers<F>(&self, fitness: &F) -> Result<IndividualList<G>, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        self.extremes(fitness, false)
    }

    /// Best fitness value in the list.
    pub fn best_fitness<F>(&self, fitness: &F) -> Result<f64, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        let values = self.fitness_values(fitness)?;
        extreme_block(&values, true)
            .first()
            .map(|&i| values[i])
            .ok_or(RankError::EmptyPopulation)
    }

    /// The `k` best members, walking tie blocks from rank 1 downwards.
    ///
    /// Within the last block taken, members are kept in list order.
    pub fn best_n<F>(&self, k: usize, fitness: &F, rng: &mut RandomSource) -> Result<IndividualList<G>, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        if self.is_empty() {
            return Err(RankError::EmptyPopulation);
        }
        let values = self.fitness_values(fitness)?;
        let k = k.min(values.len());
        let mut chosen = Vec::with_capacity(k);
        let mut rank = 1;
        while chosen.len() < k {
            let block = if rank == 1 {
                extreme_block(&values, true)
            } else {
                rank_block(&values, rank, rng)?
            };
            rank += block.len();
            let room = k - chosen.len();
            chosen.extend(block.into_iter().take(room));
        }
        Ok(self.pick(&chosen))
    }

    fn extremes<F>(&self, fitness: &F, best: bool) -> Result<IndividualList<G>, RankError>
    where
        F: FitnessFunction<G> + ?Sized,
    {
        ensure_single_objective(fitness)?;
        if self.is_empty() {
            return Err(RankError::EmptyPopulation);
        }
        let values = self.fitness_values(fitness)?;
        Ok(self.pick(&extreme_block(&values, best)))
    }
}
