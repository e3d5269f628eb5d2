//! Fitness function contract and shared caching helpers.
//!
//! Unlike the rest of the `u-*` family, fitness here is a **quality**:
//! higher values are better. Rank 1 is the individual with the largest
//! fitness.
//!
//! Optional knowledge about a function (its optimum, its bounds) is exposed
//! through capability queries returning `Option`, which callers check before
//! relying on them.

use crate::error::RankError;
use crate::population::{Individual, IndividualList};

/// Whether fitness values can be memoized on an individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Caching {
    /// Re-evaluate on every query (context-dependent or noisy functions).
    #[default]
    None,
    /// The value depends only on the genotype; evaluate once per individual.
    Static,
}

/// A single- or multi-objective fitness function.
pub trait FitnessFunction<G>: Send + Sync {
    /// Returns a human-readable name for this function.
    fn name(&self) -> &str;

    /// Number of objectives. Rank queries require exactly one.
    fn objective_count(&self) -> usize {
        1
    }

    /// Evaluates an individual.
    ///
    /// `context` is the list the individual is being ranked within; static
    /// functions ignore it. Returns one value per objective.
    fn evaluate(&self, individual: &Individual<G>, context: &IndividualList<G>) -> Vec<f64>;

    /// Caching behaviour of this function.
    fn caching(&self) -> Caching {
        Caching::None
    }

    /// Best achievable value, if known (single-objective only).
    fn optimum(&self) -> Option<f64> {
        None
    }

    /// Per-objective `(lower, upper)` bounds, if known.
    fn bounds(&self) -> Option<Vec<(f64, f64)>> {
        None
    }
}

/// Evaluates `individual`, reusing its memoized value for static functions.
///
/// The result is always recorded as the individual's latest fitness.
pub fn fitness_of<G, F>(fitness: &F, individual: &Individual<G>, context: &IndividualList<G>) -> Vec<f64>
where
    F: FitnessFunction<G> + ?Sized,
{
    if fitness.caching() == Caching::Static {
        if let Some(cached) = individual.latest_fitness() {
            return cached;
        }
    }
    let value = fitness.evaluate(individual, context);
    individual.record_fitness(value.clone());
    value
}

/// Single-objective fitness of `individual`.
pub fn single_fitness<G, F>(
    fitness: &F,
    individual: &Individual<G>,
    context: &IndividualList<G>,
) -> Result<f64, RankError>
where
    F: FitnessFunction<G> + ?Sized,
{
    ensure_single_objective(fitness)?;
    Ok(fitness_of(fitness, individual, context)
        .first()
        .copied()
        .unwrap_or(f64::NAN))
}

/// Fails with [`RankError::MultiObjective`] unless `fitness` has one objective.
pub fn ensure_single_objective<G, F>(fitness: &F) -> Result<(), RankError>
where
    F: FitnessFunction<G> + ?Sized,
{
    match fitness.objective_count() {
        1 => Ok(()),
        n => Err(RankError::MultiObjective { objectives: n }),
    }
}

/// Static single-objective fitness backed by a closure over the genotype.
///
/// ```
/// use u_evoflow::fitness::{FnFitness, FitnessFunction};
///
/// let onemax = FnFitness::new("OneMax", |g: &Vec<bool>| g.iter().filter(|b| **b).count() as f64)
///     .with_optimum(8.0);
/// assert_eq!(FitnessFunction::<Vec<bool>>::optimum(&onemax), Some(8.0));
/// ```
pub struct FnFitness<F> {
    name: String,
    func: F,
    optimum: Option<f64>,
}

impl<F> FnFitness<F> {
    /// Wraps `func` as a static fitness function.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            optimum: None,
        }
    }

    /// Declares the known optimum.
    pub fn with_optimum(mut self, optimum: f64) -> Self {
        self.optimum = Some(optimum);
        self
    }
}

impl<G, F> FitnessFunction<G> for FnFitness<F>
where
    F: Fn(&G) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, individual: &Individual<G>, _context: &IndividualList<G>) -> Vec<f64> {
        vec![(self.func)(individual.genotype())]
    }

    fn caching(&self) -> Caching {
        Caching::Static
    }

    fn optimum(&self) -> Option<f64> {
        self.optimum
    }
}
