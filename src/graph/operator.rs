//! Operator contract and the per-call context handle.

use crate::error::{GraphError, PortDirection, Result};
use crate::fitness::FitnessFunction;
use crate::param::ParameterSet;
use crate::population::IndividualList;
use crate::random::RandomSource;
use crate::schedule::GenerationIndex;
use crate::space::SearchSpace;

/// What an operator (or any module) may inspect during validation.
pub struct Environment<'a, G> {
    pub fitness: &'a dyn FitnessFunction<G>,
    pub space: &'a dyn SearchSpace<G>,
}

impl<G> Clone for Environment<'_, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G> Copy for Environment<'_, G> {}

/// Handle passed to every module call during a run.
///
/// Replaces any global "current schedule": modules reach the shared random
/// source, the active fitness function and search space, and the current
/// generation only through this value.
pub struct Context<'a, G> {
    pub rng: &'a mut RandomSource,
    pub fitness: &'a dyn FitnessFunction<G>,
    pub space: &'a dyn SearchSpace<G>,
    pub generation: GenerationIndex,
}

impl<'a, G> Context<'a, G> {
    /// Builds a context.
    pub fn new(
        rng: &'a mut RandomSource,
        fitness: &'a dyn FitnessFunction<G>,
        space: &'a dyn SearchSpace<G>,
        generation: GenerationIndex,
    ) -> Self {
        Self {
            rng,
            fitness,
            space,
            generation,
        }
    }

    /// The validation view of this context.
    pub fn environment(&self) -> Environment<'a, G> {
        Environment {
            fitness: self.fitness,
            space: self.space,
        }
    }

    /// Generation number to stamp as date of birth on new individuals.
    pub fn birth(&self) -> u64 {
        self.generation.generation
    }
}

/// A node of the operator graph.
///
/// `process` receives one list per in-port and must return exactly one
/// list per out-port. Operators with a variable number of ports override
/// [`add_port`](Self::add_port) and [`remove_port`](Self::remove_port) and
/// keep any per-port state consistent.
pub trait Operator<G>: Send {
    /// Returns a human-readable name for this operator.
    fn name(&self) -> &str;

    /// Number of in-ports.
    fn in_ports(&self) -> usize;

    /// Number of out-ports.
    fn out_ports(&self) -> usize;

    /// Appends a port. The default rejects the edit.
    fn add_port(&mut self, direction: PortDirection) -> std::result::Result<(), GraphError> {
        Err(GraphError::FixedArity {
            node: self.name().to_string(),
            direction,
        })
    }

    /// Removes the port at `index`. The default rejects the edit.
    fn remove_port(&mut self, direction: PortDirection, _index: usize) -> std::result::Result<(), GraphError> {
        Err(GraphError::FixedArity {
            node: self.name().to_string(),
            direction,
        })
    }

    /// Checks the operator's own configuration.
    fn check_syntax(&self) -> std::result::Result<(), GraphError> {
        Ok(())
    }

    /// Checks that the operator can work with the run's fitness function and
    /// search space. Fails with [`EngineError::UnsupportedEnvironment`](crate::EngineError::UnsupportedEnvironment).
    fn test_environment(&self, _env: &Environment<'_, G>) -> Result<()> {
        Ok(())
    }

    /// Drops any per-run state. Called at every run start.
    fn reset(&mut self) {}

    /// Current parameter table.
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
    }

    /// Applies a parameter table (as produced by [`parameters`](Self::parameters)).
    fn configure(&mut self, _params: &ParameterSet) -> Result<()> {
        Ok(())
    }

    /// Transforms the input lists into the output lists.
    fn process(&mut self, inputs: Vec<IndividualList<G>>, ctx: &mut Context<'_, G>) -> Result<Vec<IndividualList<G>>>;
}
