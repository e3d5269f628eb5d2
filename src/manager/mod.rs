//! Population managers.
//!
//! A [`PopulationManager`] owns the current population and decides how the
//! operator graph derives the next one:
//!
//! | Manager                | Graph invocations per generation |
//! |------------------------|----------------------------------|
//! | [`DefaultManager`]     | one, over the whole population   |
//! | [`IslandModel`]        | one per island, plus migration   |
//! | [`ParallelMultistarts`]| one per individual               |

mod config;
mod default;
mod island;
mod multistart;

pub use config::{IslandConfig, MigrationMode};
pub use default::DefaultManager;
pub use island::IslandModel;
pub use multistart::ParallelMultistarts;

use crate::error::{EngineError, GraphError, Result};
use crate::graph::{Context, Environment, Operator, OperatorGraph};
use crate::param::ParameterSet;
use crate::population::IndividualList;

/// Strategy that drives the operator graph each generation.
pub trait PopulationManager<G>: Send {
    /// Name used for batch settings and logs.
    fn name(&self) -> &str;

    /// Replaces the population with the output of `init`.
    fn init_population(&mut self, init: &mut dyn Operator<G>, ctx: &mut Context<'_, G>) -> Result<()>;

    /// Derives the next generation from the current one.
    ///
    /// Fails with [`EngineError::NoSuchIndividual`] when the population is
    /// empty.
    fn create_new_generation(&mut self, graph: &mut OperatorGraph<G>, ctx: &mut Context<'_, G>) -> Result<()>;

    /// The whole current population.
    fn population(&self) -> &IndividualList<G>;

    /// Labeled lists to publish for the generation just created.
    ///
    /// The Schedule fires one individual-list event per entry.
    fn drain_emitted(&mut self) -> Vec<(String, IndividualList<G>)> {
        Vec::new()
    }

    /// Checks the manager can work with the run's environment.
    fn test_environment(&self, _env: &Environment<'_, G>) -> Result<()> {
        Ok(())
    }

    /// Drops the population and any per-run state.
    fn reset(&mut self);

    /// Current parameter table.
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
    }

    /// Applies a parameter table.
    fn configure(&mut self, _params: &ParameterSet) -> Result<()> {
        Ok(())
    }
}

/// Runs an initialization operator and returns its single output list.
pub fn initial_list<G>(init: &mut dyn Operator<G>, ctx: &mut Context<'_, G>) -> Result<IndividualList<G>> {
    let mut outputs = init.process(Vec::new(), ctx)?;
    if outputs.len() != 1 {
        return Err(GraphError::OutputLengthMismatch {
            node: init.name().to_string(),
            expected: 1,
            actual: outputs.len(),
        }
        .into());
    }
    Ok(outputs.remove(0))
}

pub(crate) fn require_members<G>(population: &IndividualList<G>, manager: &str) -> Result<()> {
    if population.is_empty() {
        return Err(EngineError::NoSuchIndividual(format!(
            "{manager} cannot create a generation from an empty population"
        )));
    }
    Ok(())
}
