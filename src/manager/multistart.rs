//! Independent restarts, one per individual.

use super::{initial_list, require_members, PopulationManager};
use crate::error::Result;
use crate::graph::{Context, Operator, OperatorGraph};
use crate::population::{Genotype, IndividualList};

/// Treats every individual as a population of size one.
///
/// Each generation runs the whole graph once per individual, in population
/// order, and concatenates the outputs in that same order.
pub struct ParallelMultistarts<G> {
    population: IndividualList<G>,
    fresh: bool,
}

impl<G> ParallelMultistarts<G> {
    /// Creates a manager with an empty population.
    pub fn new() -> Self {
        Self {
            population: IndividualList::new(),
            fresh: false,
        }
    }
}

impl<G> Default for ParallelMultistarts<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Genotype> PopulationManager<G> for ParallelMultistarts<G> {
    fn name(&self) -> &str {
        "ParallelMultistarts"
    }

    fn init_population(&mut self, init: &mut dyn Operator<G>, ctx: &mut Context<'_, G>) -> Result<()> {
        self.population = initial_list(init, ctx)?;
        self.fresh = true;
        Ok(())
    }

    fn create_new_generation(&mut self, graph: &mut OperatorGraph<G>, ctx: &mut Context<'_, G>) -> Result<()> {
        require_members(&self.population, "ParallelMultistarts")?;
        let mut next = IndividualList::with_capacity(self.population.len());
        for member in self.population.iter() {
            let single: IndividualList<G> = std::iter::once(member.clone()).collect();
            for list in graph.process(&single, ctx)? {
                next.extend_from(&list);
            }
        }
        self.population = next;
        self.fresh = true;
        Ok(())
    }

    fn population(&self) -> &IndividualList<G> {
        &self.population
    }

    fn drain_emitted(&mut self) -> Vec<(String, IndividualList<G>)> {
        if !std::mem::take(&mut self.fresh) {
            return Vec::new();
        }
        vec![("population".to_string(), self.population.clone())]
    }

    fn reset(&mut self) {
        self.population = IndividualList::new();
        self.fresh = false;
    }
}
