//! Stopping criteria.
//!
//! The Schedule polls every criterion once per generation, after the
//! generation's events have been fired. A run completes as soon as one
//! criterion reports `true`.

use crate::error::{EngineError, Result};
use crate::fitness::FitnessFunction;
use crate::graph::Environment;
use crate::param::{ParamValue, ParameterSet};
use crate::population::{Genotype, IndividualList};
use crate::schedule::GenerationIndex;

/// What a criterion sees each generation.
pub struct StopState<'a, G> {
    /// The generation just created.
    pub generation: GenerationIndex,
    /// The whole current population.
    pub population: &'a IndividualList<G>,
    /// The run's fitness function.
    pub fitness: &'a dyn FitnessFunction<G>,
}

/// Decides when a run is done.
pub trait StoppingCriterion<G>: Send {
    /// Name used for batch settings and logs.
    fn name(&self) -> &str;

    /// Returns `true` to complete the run.
    fn should_stop(&mut self, state: &StopState<'_, G>) -> Result<bool>;

    /// Drops per-run state. Called at every run start.
    fn reset(&mut self) {}

    /// Checks the criterion can work with the run's environment.
    fn test_environment(&self, _env: &Environment<'_, G>) -> Result<()> {
        Ok(())
    }

    /// Current parameter table.
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
    }

    /// Applies a parameter table.
    fn configure(&mut self, _params: &ParameterSet) -> Result<()> {
        Ok(())
    }
}

/// Stops after a fixed number of generations.
#[derive(Debug, Clone)]
pub struct MaxGenerations {
    limit: u64,
}

impl MaxGenerations {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }
}

impl<G> StoppingCriterion<G> for MaxGenerations {
    fn name(&self) -> &str {
        "MaxGenerations"
    }

    fn should_stop(&mut self, state: &StopState<'_, G>) -> Result<bool> {
        Ok(state.generation.generation >= self.limit)
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet::new().with("limit", ParamValue::Int(self.limit as i64))
    }

    fn configure(&mut self, params: &ParameterSet) -> Result<()> {
        self.limit = params.usize("limit")? as u64;
        Ok(())
    }
}

/// Stops once the best fitness reaches `target`.
#[derive(Debug, Clone)]
pub struct FitnessReached {
    target: f64,
}

impl FitnessReached {
    pub fn new(target: f64) -> Self {
        Self { target }
    }
}

impl<G: Genotype> StoppingCriterion<G> for FitnessReached {
    fn name(&self) -> &str {
        "FitnessReached"
    }

    fn should_stop(&mut self, state: &StopState<'_, G>) -> Result<bool> {
        Ok(state.population.best_fitness(state.fitness)? >= self.target)
    }

    fn test_environment(&self, env: &Environment<'_, G>) -> Result<()> {
        single_objective("FitnessReached", env)
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet::new().with("target", ParamValue::Float(self.target))
    }

    fn configure(&mut self, params: &ParameterSet) -> Result<()> {
        self.target = params.f64("target")?;
        Ok(())
    }
}

/// Stops once the best fitness is within `tolerance` of the known optimum.
///
/// Needs a fitness function that reports its optimum.
#[derive(Debug, Clone)]
pub struct OptimumReached {
    tolerance: f64,
}

impl OptimumReached {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
        }
    }
}

impl Default for OptimumReached {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl<G: Genotype> StoppingCriterion<G> for OptimumReached {
    fn name(&self) -> &str {
        "OptimumReached"
    }

    fn should_stop(&mut self, state: &StopState<'_, G>) -> Result<bool> {
        let optimum = state.fitness.optimum().ok_or_else(|| EngineError::Unsupported {
            capability: format!("optimum of '{}'", state.fitness.name()),
        })?;
        Ok(state.population.best_fitness(state.fitness)? >= optimum - self.tolerance)
    }

    fn test_environment(&self, env: &Environment<'_, G>) -> Result<()> {
        single_objective("OptimumReached", env)?;
        if env.fitness.optimum().is_none() {
            return Err(EngineError::UnsupportedEnvironment {
                module: "OptimumReached".into(),
                reason: format!("'{}' does not report an optimum", env.fitness.name()),
            });
        }
        Ok(())
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet::new().with("tolerance", ParamValue::Float(self.tolerance))
    }

    fn configure(&mut self, params: &ParameterSet) -> Result<()> {
        self.tolerance = params.f64("tolerance")?.max(0.0);
        Ok(())
    }
}

/// Stops when the best fitness has not improved for `generations`
/// consecutive generations.
///
/// An improvement smaller than `min_improvement` does not count.
#[derive(Debug, Clone)]
pub struct Stagnation {
    generations: u64,
    min_improvement: f64,
    best: Option<f64>,
    stalled: u64,
}

impl Stagnation {
    pub fn new(generations: u64) -> Self {
        Self {
            generations,
            min_improvement: 0.0,
            best: None,
            stalled: 0,
        }
    }

    /// Sets the smallest gain that resets the counter.
    pub fn with_min_improvement(mut self, delta: f64) -> Self {
        self.min_improvement = delta.max(0.0);
        self
    }
}

impl<G: Genotype> StoppingCriterion<G> for Stagnation {
    fn name(&self) -> &str {
        "Stagnation"
    }

    fn should_stop(&mut self, state: &StopState<'_, G>) -> Result<bool> {
        let current = state.population.best_fitness(state.fitness)?;
        match self.best {
            Some(best) if current <= best + self.min_improvement => self.stalled += 1,
            _ => {
                self.best = Some(self.best.map_or(current, |b| b.max(current)));
                self.stalled = 0;
            }
        }
        Ok(self.stalled >= self.generations)
    }

    fn reset(&mut self) {
        self.best = None;
        self.stalled = 0;
    }

    fn test_environment(&self, env: &Environment<'_, G>) -> Result<()> {
        single_objective("Stagnation", env)
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with("generations", ParamValue::Int(self.generations as i64))
            .with("min_improvement", ParamValue::Float(self.min_improvement))
    }

    fn configure(&mut self, params: &ParameterSet) -> Result<()> {
        self.generations = params.usize("generations")? as u64;
        self.min_improvement = params.f64("min_improvement")?.max(0.0);
        Ok(())
    }
}

fn single_objective<G>(module: &str, env: &Environment<'_, G>) -> Result<()> {
    match env.fitness.objective_count() {
        1 => Ok(()),
        n => Err(EngineError::UnsupportedEnvironment {
            module: module.into(),
            reason: format!("needs a single-objective fitness function, '{}' has {n} objectives", env.fitness.name()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::FnFitness;
    use crate::population::Individual;
    use crate::schedule::BatchIndex;
    use crate::space::BitStringSpace;

    fn ident() -> FnFitness<fn(&f64) -> f64> {
        FnFitness::new("identity", (|g: &f64| *g) as fn(&f64) -> f64)
    }

    fn list(values: &[f64]) -> IndividualList<f64> {
        IndividualList::from_individuals(values.iter().map(|&v| Individual::new(v, 0)).collect())
    }

    fn at(generation: u64) -> GenerationIndex {
        GenerationIndex {
            run: BatchIndex(0).first_run(),
            generation,
        }
    }

    fn state<'a>(generation: u64, population: &'a IndividualList<f64>, fitness: &'a dyn FitnessFunction<f64>) -> StopState<'a, f64> {
        StopState {
            generation: at(generation),
            population,
            fitness,
        }
    }

    #[test]
    fn test_max_generations() {
        let fitness = ident();
        let pop = list(&[1.0]);
        let mut c = MaxGenerations::new(3);
        assert!(!StoppingCriterion::<f64>::should_stop(&mut c, &state(2, &pop, &fitness)).unwrap());
        assert!(StoppingCriterion::<f64>::should_stop(&mut c, &state(3, &pop, &fitness)).unwrap());
    }

    #[test]
    fn test_fitness_reached() {
        let fitness = ident();
        let low = list(&[1.0, 2.0]);
        let high = list(&[1.0, 5.0]);
        let empty = IndividualList::new();
        let mut c = FitnessReached::new(5.0);
        assert!(!c.should_stop(&state(1, &low, &fitness)).unwrap());
        assert!(c.should_stop(&state(1, &high, &fitness)).unwrap());
        assert!(matches!(
            c.should_stop(&state(1, &empty, &fitness)),
            Err(EngineError::NoSuchIndividual(_))
        ));
    }

    #[test]
    fn test_optimum_requires_capability() {
        let space = BitStringSpace::new(1);
        let bits = FnFitness::new("bits", (|g: &Vec<bool>| g.len() as f64) as fn(&Vec<bool>) -> f64);
        let env: Environment<'_, Vec<bool>> = Environment {
            fitness: &bits,
            space: &space,
        };
        assert!(matches!(
            StoppingCriterion::<Vec<bool>>::test_environment(&OptimumReached::default(), &env),
            Err(EngineError::UnsupportedEnvironment { .. })
        ));

        let mut c = OptimumReached::new(0.5);
        let pop = list(&[9.6]);
        let plain = ident();
        assert!(matches!(
            c.should_stop(&state(1, &pop, &plain)),
            Err(EngineError::Unsupported { .. })
        ));
        let known = ident().with_optimum(10.0);
        assert!(c.should_stop(&state(1, &pop, &known)).unwrap());
    }

    #[test]
    fn test_stagnation_counts_flat_generations() {
        let fitness = ident();
        let mut c = Stagnation::new(2);
        let flat = list(&[3.0]);
        let better = list(&[4.0]);
        assert!(!c.should_stop(&state(1, &flat, &fitness)).unwrap());
        assert!(!c.should_stop(&state(2, &flat, &fitness)).unwrap());
        assert!(!c.should_stop(&state(3, &better, &fitness)).unwrap());
        assert!(!c.should_stop(&state(4, &better, &fitness)).unwrap());
        assert!(c.should_stop(&state(5, &better, &fitness)).unwrap());

        StoppingCriterion::<f64>::reset(&mut c);
        assert!(!c.should_stop(&state(6, &flat, &fitness)).unwrap());
    }
}
