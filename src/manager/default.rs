//! Single-population manager.

use super::{initial_list, require_members, PopulationManager};
use crate::error::Result;
use crate::graph::{Context, Operator, OperatorGraph};
use crate::population::{Genotype, IndividualList};

/// Runs the graph once per generation over the whole population.
///
/// The next generation is the concatenation of every graph output, in
/// output order.
pub struct DefaultManager<G> {
    population: IndividualList<G>,
    fresh: bool,
}

impl<G> DefaultManager<G> {
    /// Creates a manager with an empty population.
    pub fn new() -> Self {
        Self {
            population: IndividualList::new(),
            fresh: false,
        }
    }
}

impl<G> Default for DefaultManager<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Genotype> PopulationManager<G> for DefaultManager<G> {
    fn name(&self) -> &str {
        "DefaultManager"
    }

    fn init_population(&mut self, init: &mut dyn Operator<G>, ctx: &mut Context<'_, G>) -> Result<()> {
        self.population = initial_list(init, ctx)?;
        self.fresh = true;
        Ok(())
    }

    fn create_new_generation(&mut self, graph: &mut OperatorGraph<G>, ctx: &mut Context<'_, G>) -> Result<()> {
        require_members(&self.population, "DefaultManager")?;
        let outputs = graph.process(&self.population, ctx)?;
        self.population = IndividualList::concat(&outputs);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::fitness::FnFitness;
    use crate::graph::{EliteSelection, Identity, RandomInitialization};
    use crate::random::RandomSource;
    use crate::schedule::GenerationIndex;
    use crate::space::BitStringSpace;

    type Bits = Vec<bool>;

    fn onemax() -> FnFitness<fn(&Bits) -> f64> {
        FnFitness::new("OneMax", (|g: &Bits| g.iter().filter(|b| **b).count() as f64) as fn(&Bits) -> f64)
    }

    #[test]
    fn test_concatenates_all_outputs() {
        let mut graph: OperatorGraph<Bits> = OperatorGraph::new();
        let elite = graph.add_node(EliteSelection::new(2));
        let keep = graph.add_node(Identity);
        graph.set_entry(elite, 0).unwrap();
        graph.set_entry(keep, 0).unwrap();
        graph.add_output(elite, 0).unwrap();
        graph.add_output(keep, 0).unwrap();

        let mut rng = RandomSource::new(8);
        let fitness = onemax();
        let space = BitStringSpace::new(16);
        let mut ctx: Context<'_, Bits> = Context::new(&mut rng, &fitness, &space, GenerationIndex::default());

        let mut manager: DefaultManager<Bits> = DefaultManager::new();
        manager
            .init_population(&mut RandomInitialization::new(6), &mut ctx)
            .unwrap();
        assert_eq!(manager.drain_emitted().len(), 1);
        assert!(manager.drain_emitted().is_empty());

        let before = manager.population().clone();
        manager.create_new_generation(&mut graph, &mut ctx).unwrap();
        let after = manager.population();
        assert_eq!(after.len(), 8);
        assert!(before.iter().all(|m| after.contains(m)));
        assert_eq!(
            after.get(0).map(|m| m.genotype().iter().filter(|b| **b).count()),
            Some(before.best_fitness(&fitness).unwrap() as usize)
        );
    }

    #[test]
    fn test_empty_population_is_fatal_for_the_run() {
        let mut graph = OperatorGraph::single(Identity).unwrap();
        let mut rng = RandomSource::new(1);
        let fitness = onemax();
        let space = BitStringSpace::new(4);
        let mut ctx: Context<'_, Bits> = Context::new(&mut rng, &fitness, &space, GenerationIndex::default());

        let mut manager: DefaultManager<Bits> = DefaultManager::new();
        let err = manager.create_new_generation(&mut graph, &mut ctx).unwrap_err();
        assert!(matches!(err, EngineError::NoSuchIndividual(_)));
    }

    struct TwoLists;

    impl Operator<Bits> for TwoLists {
        fn name(&self) -> &str {
            "TwoLists"
        }
        fn in_ports(&self) -> usize {
            0
        }
        fn out_ports(&self) -> usize {
            2
        }
        fn process(&mut self, _inputs: Vec<IndividualList<Bits>>, _ctx: &mut Context<'_, Bits>) -> Result<Vec<IndividualList<Bits>>> {
            Ok(vec![IndividualList::new(), IndividualList::new()])
        }
    }

    #[test]
    fn test_initialization_must_yield_one_list() {
        let mut rng = RandomSource::new(1);
        let fitness = onemax();
        let space = BitStringSpace::new(4);
        let mut ctx: Context<'_, Bits> = Context::new(&mut rng, &fitness, &space, GenerationIndex::default());

        let mut manager: DefaultManager<Bits> = DefaultManager::new();
        let err = manager.init_population(&mut TwoLists, &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Graph(crate::error::GraphError::OutputLengthMismatch { expected: 1, actual: 2, .. })
        ));
    }
}
