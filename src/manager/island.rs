//! Island model with ring migration.

use super::config::{IslandConfig, MigrationMode};
use super::{initial_list, require_members, PopulationManager};
use crate::error::{EngineError, Result};
use crate::graph::{Context, Environment, Operator, OperatorGraph};
use crate::param::{ParamValue, ParameterSet};
use crate::population::{Genotype, IndividualList};

/// Evolves subpopulations independently and migrates between them.
///
/// The initial population is dealt round-robin into
/// `subpopulation_count` islands. Each generation runs the graph once per
/// non-empty island. After every `epoch_length`-th generation, island `i`
/// sends `migrants_count` distinct individuals, drawn fitness-proportionally,
/// to island `(i + 1) % n`. All migrants are chosen before any island
/// changes, so the total number of individuals is the same before and
/// after every migration.
pub struct IslandModel<G> {
    config: IslandConfig,
    islands: Vec<IndividualList<G>>,
    combined: IndividualList<G>,
    fresh: bool,
}

impl<G: Genotype> IslandModel<G> {
    /// Creates an island model.
    pub fn new(config: IslandConfig) -> Self {
        Self {
            config,
            islands: Vec::new(),
            combined: IndividualList::new(),
            fresh: false,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &IslandConfig {
        &self.config
    }

    /// Current subpopulations.
    pub fn islands(&self) -> &[IndividualList<G>] {
        &self.islands
    }

    fn rebuild_combined(&mut self) {
        self.combined = IndividualList::concat(&self.islands);
        self.fresh = true;
    }

    /// Sends migrants around the ring.
    fn migrate(&mut self, ctx: &mut Context<'_, G>) -> Result<()> {
        let n = self.islands.len();
        let mut picks = Vec::with_capacity(n);
        for island in &self.islands {
            let positions = island.proportional_selection(self.config.migrants_count, ctx.fitness, ctx.rng)?;
            picks.push(positions);
        }
        let migrants: Vec<IndividualList<G>> = self
            .islands
            .iter()
            .zip(&picks)
            .map(|(island, positions)| island.pick(positions))
            .collect();

        if self.config.migration == MigrationMode::Move {
            for (island, positions) in self.islands.iter_mut().zip(&picks) {
                island.remove_positions(positions);
            }
        }
        for (from, group) in migrants.iter().enumerate() {
            self.islands[(from + 1) % n].extend_from(group);
        }
        if self.config.migration == MigrationMode::Copy {
            for (from, group) in migrants.iter().enumerate() {
                let receiver = &mut self.islands[(from + 1) % n];
                let victims = receiver.inverse_proportional_selection(group.len(), ctx.fitness, ctx.rng)?;
                receiver.remove_positions(&victims);
            }
        }

        log::debug!(
            "{}: migrated {} individuals across {} islands ({:?})",
            ctx.generation,
            migrants.iter().map(IndividualList::len).sum::<usize>(),
            n,
            self.config.migration
        );
        Ok(())
    }
}

impl<G: Genotype> PopulationManager<G> for IslandModel<G> {
    fn name(&self) -> &str {
        "IslandModel"
    }

    fn init_population(&mut self, init: &mut dyn Operator<G>, ctx: &mut Context<'_, G>) -> Result<()> {
        let population = initial_list(init, ctx)?;
        let count = self.config.subpopulation_count.max(1);
        let mut islands: Vec<IndividualList<G>> = (0..count).map(|_| IndividualList::new()).collect();
        for (i, member) in population.into_iter().enumerate() {
            islands[i % count].push_ref(member);
        }
        self.islands = islands;
        self.rebuild_combined();
        Ok(())
    }

    fn create_new_generation(&mut self, graph: &mut OperatorGraph<G>, ctx: &mut Context<'_, G>) -> Result<()> {
        require_members(&self.combined, "IslandModel")?;
        for island in &mut self.islands {
            if island.is_empty() {
                continue;
            }
            let outputs = graph.process(island, ctx)?;
            *island = IndividualList::concat(&outputs);
        }

        let epoch = self.config.epoch_length;
        if self.config.migrates() && ctx.generation.generation % epoch == 0 {
            self.migrate(ctx)?;
        }
        self.rebuild_combined();
        Ok(())
    }

    fn population(&self) -> &IndividualList<G> {
        &self.combined
    }

    fn drain_emitted(&mut self) -> Vec<(String, IndividualList<G>)> {
        if !std::mem::take(&mut self.fresh) {
            return Vec::new();
        }
        self.islands
            .iter()
            .enumerate()
            .map(|(i, island)| (format!("island {i}"), island.clone()))
            .collect()
    }

    fn test_environment(&self, env: &Environment<'_, G>) -> Result<()> {
        if self.config.migrates() && env.fitness.objective_count() != 1 {
            return Err(EngineError::UnsupportedEnvironment {
                module: "IslandModel".into(),
                reason: "fitness-proportional migration needs a single-objective fitness function".into(),
            });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.islands.clear();
        self.combined = IndividualList::new();
        self.fresh = false;
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .with("subpopulations", ParamValue::Int(self.config.subpopulation_count as i64))
            .with("epoch_length", ParamValue::Int(self.config.epoch_length as i64))
            .with("migrants", ParamValue::Int(self.config.migrants_count as i64))
            .with("copy_migrants", ParamValue::Bool(self.config.migration == MigrationMode::Copy))
    }

    fn configure(&mut self, params: &ParameterSet) -> Result<()> {
        let mode = if params.bool("copy_migrants")? {
            MigrationMode::Copy
        } else {
            MigrationMode::Move
        };
        let config = IslandConfig::default()
            .with_subpopulation_count(params.usize("subpopulations")?)
            .with_epoch_length(params.usize("epoch_length")? as u64)
            .with_migrants_count(params.usize("migrants")?)
            .with_migration(mode);
        config.validate().map_err(EngineError::Configuration)?;
        self.config = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::{FitnessFunction, FnFitness};
    use crate::graph::{Identity, RandomInitialization};
    use crate::population::{Individual, IndividualList};
    use crate::random::RandomSource;
    use crate::schedule::GenerationIndex;
    use crate::space::BitStringSpace;
    use proptest::prelude::*;

    type Bits = Vec<bool>;

    fn onemax() -> FnFitness<fn(&Bits) -> f64> {
        FnFitness::new("OneMax", (|g: &Bits| g.iter().filter(|b| **b).count() as f64) as fn(&Bits) -> f64)
    }

    /// Runs `generations` generations of an identity graph and returns the
    /// island sizes after each.
    fn evolve(config: IslandConfig, size: usize, generations: u64, seed: u64) -> (Vec<Vec<usize>>, IslandModel<Bits>) {
        let mut rng = RandomSource::new(seed);
        let fitness = onemax();
        let space = BitStringSpace::new(12);
        let mut graph = OperatorGraph::single(Identity).unwrap();
        let mut model = IslandModel::new(config);
        let mut ctx: Context<'_, Bits> = Context::new(&mut rng, &fitness, &space, GenerationIndex::default());
        model
            .init_population(&mut RandomInitialization::new(size), &mut ctx)
            .unwrap();

        let mut sizes = Vec::new();
        for g in 1..=generations {
            ctx.generation.generation = g;
            model.create_new_generation(&mut graph, &mut ctx).unwrap();
            sizes.push(model.islands().iter().map(IndividualList::len).collect());
        }
        (sizes, model)
    }

    // ---- partition ----

    #[test]
    fn test_round_robin_partition() {
        let (_, mut model) = evolve(IslandConfig::default().with_subpopulation_count(3), 7, 0, 1);
        let sizes: Vec<usize> = model.islands().iter().map(IndividualList::len).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
        assert_eq!(model.population().len(), 7);
        assert_eq!(model.drain_emitted().len(), 3);
    }

    // ---- migration ----

    #[test]
    fn test_move_sends_to_ring_neighbor() {
        let config = IslandConfig::default()
            .with_subpopulation_count(2)
            .with_epoch_length(1)
            .with_migrants_count(1);
        let mut rng = RandomSource::new(4);
        let fitness = onemax();
        let space = BitStringSpace::new(12);
        let mut graph = OperatorGraph::single(Identity).unwrap();
        let mut model = IslandModel::new(config);
        let mut ctx: Context<'_, Bits> = Context::new(&mut rng, &fitness, &space, GenerationIndex::default());
        model
            .init_population(&mut RandomInitialization::new(6), &mut ctx)
            .unwrap();
        let before: Vec<IndividualList<Bits>> = model.islands().to_vec();

        ctx.generation.generation = 1;
        model.create_new_generation(&mut graph, &mut ctx).unwrap();
        let after = model.islands();
        for (i, island) in after.iter().enumerate() {
            assert_eq!(island.len(), 3);
            let from_neighbor = island.iter().filter(|m| before[1 - i].contains(m)).count();
            assert_eq!(from_neighbor, 1);
        }
    }

    #[test]
    fn test_copy_keeps_island_sizes() {
        let config = IslandConfig::default()
            .with_subpopulation_count(3)
            .with_epoch_length(2)
            .with_migrants_count(2)
            .with_migration(MigrationMode::Copy);
        let (sizes, _) = evolve(config, 12, 6, 9);
        assert!(sizes.iter().all(|s| s == &vec![4, 4, 4]));
    }

    #[test]
    fn test_no_migration_between_epochs() {
        let config = IslandConfig::default()
            .with_subpopulation_count(2)
            .with_epoch_length(3)
            .with_migrants_count(2);
        let (_, mut model) = evolve(config, 8, 2, 5);
        let islands = model.islands().to_vec();
        let mut rng = RandomSource::new(0);
        let fitness = onemax();
        let space = BitStringSpace::new(12);
        let mut ctx: Context<'_, Bits> = Context::new(&mut rng, &fitness, &space, GenerationIndex::default());
        ctx.generation.generation = 2;
        let mut graph = OperatorGraph::single(Identity).unwrap();
        model.create_new_generation(&mut graph, &mut ctx).unwrap();
        for (a, b) in model.islands().iter().zip(&islands) {
            assert!(a.iter().all(|m| b.contains(m)));
        }
    }

    // ---- failures ----

    #[test]
    fn test_empty_population() {
        let mut model: IslandModel<Bits> = IslandModel::new(IslandConfig::default());
        let mut rng = RandomSource::new(0);
        let fitness = onemax();
        let space = BitStringSpace::new(4);
        let mut ctx: Context<'_, Bits> = Context::new(&mut rng, &fitness, &space, GenerationIndex::default());
        let mut graph = OperatorGraph::single(Identity).unwrap();
        assert!(matches!(
            model.create_new_generation(&mut graph, &mut ctx),
            Err(EngineError::NoSuchIndividual(_))
        ));
    }

    struct Pair;

    impl FitnessFunction<Bits> for Pair {
        fn name(&self) -> &str {
            "Pair"
        }
        fn objective_count(&self) -> usize {
            2
        }
        fn evaluate(&self, _ind: &Individual<Bits>, _ctx: &IndividualList<Bits>) -> Vec<f64> {
            vec![0.0, 0.0]
        }
    }

    #[test]
    fn test_migration_needs_single_objective() {
        let model: IslandModel<Bits> = IslandModel::new(IslandConfig::default());
        let space = BitStringSpace::new(4);
        let env: Environment<'_, Bits> = Environment {
            fitness: &Pair,
            space: &space,
        };
        assert!(matches!(
            model.test_environment(&env),
            Err(EngineError::UnsupportedEnvironment { .. })
        ));
        let quiet: IslandModel<Bits> = IslandModel::new(IslandConfig::default().with_migrants_count(0));
        assert!(quiet.test_environment(&env).is_ok());
    }

    #[test]
    fn test_configure() {
        let mut model: IslandModel<Bits> = IslandModel::new(IslandConfig::default());
        let mut params = model.parameters();
        params.set("subpopulations", ParamValue::Int(5)).unwrap();
        params.set("copy_migrants", ParamValue::Bool(true)).unwrap();
        model.configure(&params).unwrap();
        assert_eq!(model.config().subpopulation_count, 5);
        assert_eq!(model.config().migration, MigrationMode::Copy);

        params.set("subpopulations", ParamValue::Int(1)).unwrap();
        assert!(model.configure(&params).unwrap_err().is_configuration());
    }

    proptest! {
        #[test]
        fn prop_total_size_is_invariant(
            islands in 2usize..6,
            size in 1usize..40,
            migrants in 0usize..6,
            copy in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let mode = if copy { MigrationMode::Copy } else { MigrationMode::Move };
            let config = IslandConfig::default()
                .with_subpopulation_count(islands)
                .with_epoch_length(1)
                .with_migrants_count(migrants)
                .with_migration(mode);
            let (sizes, _) = evolve(config, size, 4, seed);
            for s in sizes {
                prop_assert_eq!(s.iter().sum::<usize>(), size);
            }
        }
    }
}
