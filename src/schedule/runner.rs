//! Batch, run and generation lifecycle.
//!
//! [`Schedule`] owns every module of an evolutionary run and drives them
//! through `batch -> run -> generation`, firing the matching events:
//!
//! ```text
//! ScheduleEvent(Started | Edited)
//! BatchEvent(Started)
//!   RunEvent(Started)
//!     GenerationEvent(1) IndividualListEvent* ... GenerationEvent(n) ...
//!   RunEvent(Completed | Aborted)
//!   RunEvent(Finalize)
//! BatchEvent(Finished)
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::batch::Batch;
use super::config::ScheduleConfig;
use super::index::{BatchIndex, GenerationIndex, RunIndex};
use super::stopping::{StopState, StoppingCriterion};
use crate::error::{EngineError, GraphError, Result};
use crate::event::{
    BatchEvent, BatchPhase, Event, EventController, GenerationEvent, IndividualListEvent, Listener,
    ListenerId, RunEvent, RunPhase, ScheduleChange, ScheduleEvent, SourceId,
};
use crate::fitness::FitnessFunction;
use crate::graph::{Context, Environment, NodeId, Operator, OperatorGraph, RandomInitialization};
use crate::manager::{DefaultManager, PopulationManager};
use crate::param::ParameterSet;
use crate::population::Genotype;
use crate::random::RandomSource;
use crate::space::SearchSpace;

/// Cooperative cancellation for a running [`Schedule`].
///
/// Both requests are honored between generations, never inside an
/// operator. Clones share the same flags, so a handle can be moved to
/// another thread before [`Schedule::run`] is called.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    skip: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl StopHandle {
    /// Aborts the current run; the schedule moves on to the next one.
    pub fn skip_run(&self) {
        self.skip.store(true, Ordering::Relaxed);
    }

    /// Aborts the current run and leaves the remaining batches queued.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Returns `true` if a skip is pending.
    pub fn is_skip_requested(&self) -> bool {
        self.skip.load(Ordering::Relaxed)
    }

    /// Returns `true` if a stop is pending.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn clear_skip(&self) {
        self.skip.store(false, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.skip.store(false, Ordering::Relaxed);
        self.stop.store(false, Ordering::Relaxed);
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunStatus {
    /// A stopping criterion (or the generation guard) ended the run.
    Completed,
    /// The run was skipped, stopped, or failed with a runtime error.
    Aborted { reason: String },
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    pub run: RunIndex,
    /// Seed the random source started from.
    pub seed: u64,
    pub status: RunStatus,
    /// Generations created after the initial population.
    pub generations: u64,
    /// Best single-objective fitness of the final population, if defined.
    pub best_fitness: Option<f64>,
}

/// A queued batch whose settings could not be applied.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RejectedBatch {
    pub batch: BatchIndex,
    pub reason: String,
}

/// Summary of one [`Schedule::run`] call.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleReport {
    pub runs: Vec<RunReport>,
    /// Batches skipped because their settings failed to apply.
    pub rejected: Vec<RejectedBatch>,
}

impl ScheduleReport {
    /// Number of runs that completed.
    pub fn completed(&self) -> usize {
        self.runs.iter().filter(|r| r.status == RunStatus::Completed).count()
    }

    /// Number of runs that were aborted.
    pub fn aborted(&self) -> usize {
        self.runs.len() - self.completed()
    }

    /// Best fitness over all runs.
    pub fn best_fitness(&self) -> Option<f64> {
        self.runs.iter().filter_map(|r| r.best_fitness).reduce(f64::max)
    }
}

/// Owner and driver of an evolutionary run.
///
/// # Usage
///
/// ```
/// use u_evoflow::fitness::FnFitness;
/// use u_evoflow::graph::{OperatorGraph, TruncationSelection};
/// use u_evoflow::schedule::{MaxGenerations, Schedule, ScheduleConfig};
/// use u_evoflow::space::BitStringSpace;
///
/// let onemax = FnFitness::new("OneMax", |g: &Vec<bool>| g.iter().filter(|b| **b).count() as f64);
/// let mut schedule = Schedule::new(onemax, BitStringSpace::new(16))
///     .with_config(ScheduleConfig::default().with_runs_per_batch(2))
///     .with_graph(OperatorGraph::single(TruncationSelection::new(0.5)).unwrap())
///     .with_criterion(MaxGenerations::new(5));
///
/// let report = schedule.run().unwrap();
/// assert_eq!(report.completed(), 2);
/// ```
pub struct Schedule<G> {
    config: ScheduleConfig,
    fitness: Box<dyn FitnessFunction<G>>,
    space: Box<dyn SearchSpace<G>>,
    initialization: Box<dyn Operator<G>>,
    graph: OperatorGraph<G>,
    manager: Box<dyn PopulationManager<G>>,
    criteria: Vec<Box<dyn StoppingCriterion<G>>>,
    events: EventController<G>,
    source: SourceId,
    pending: VecDeque<Batch>,
    next_batch: BatchIndex,
    started: bool,
    edited: bool,
    runs_started: u64,
    rng: RandomSource,
    stop: StopHandle,
}

impl<G: Genotype> Schedule<G> {
    /// Creates a schedule with a 100-individual random initialization, an
    /// empty graph and the [`DefaultManager`].
    pub fn new<F, S>(fitness: F, space: S) -> Self
    where
        F: FitnessFunction<G> + 'static,
        S: SearchSpace<G> + 'static,
    {
        let mut events = EventController::new();
        let source = events.new_source();
        Self {
            config: ScheduleConfig::default(),
            fitness: Box::new(fitness),
            space: Box::new(space),
            initialization: Box::new(RandomInitialization::new(100)),
            graph: OperatorGraph::new(),
            manager: Box::new(DefaultManager::new()),
            criteria: Vec::new(),
            events,
            source,
            pending: VecDeque::new(),
            next_batch: BatchIndex(0),
            started: false,
            edited: false,
            runs_started: 0,
            rng: RandomSource::new(0),
            stop: StopHandle::default(),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: ScheduleConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the initialization operator (no in-ports, one out-port).
    pub fn with_initialization<O: Operator<G> + 'static>(mut self, init: O) -> Self {
        self.initialization = Box::new(init);
        self
    }

    /// Sets the operator graph.
    pub fn with_graph(mut self, graph: OperatorGraph<G>) -> Self {
        self.graph = graph;
        self
    }

    /// Sets the population manager.
    pub fn with_manager<M: PopulationManager<G> + 'static>(mut self, manager: M) -> Self {
        self.manager = Box::new(manager);
        self
    }

    /// Adds a stopping criterion.
    pub fn with_criterion<C: StoppingCriterion<G> + 'static>(mut self, criterion: C) -> Self {
        self.criteria.push(Box::new(criterion));
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// The operator graph, for inspection.
    pub fn graph(&self) -> &OperatorGraph<G> {
        &self.graph
    }

    /// The operator graph, for structural edits between runs.
    pub fn graph_mut(&mut self) -> &mut OperatorGraph<G> {
        &mut self.graph
    }

    /// The population manager.
    pub fn manager(&self) -> &dyn PopulationManager<G> {
        self.manager.as_ref()
    }

    /// Source identity of the events this schedule raises.
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// The event controller, for fine-grained registrations.
    pub fn events_mut(&mut self) -> &mut EventController<G> {
        &mut self.events
    }

    /// Adds a listener subscribed to every event this schedule raises.
    pub fn add_listener<L: Listener<G> + 'static>(&mut self, listener: L) -> Result<ListenerId> {
        let id = self.events.add_listener(listener);
        self.events.register_all(id, self.source)?;
        Ok(id)
    }

    /// A handle for cancelling runs from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Batches waiting to run.
    pub fn pending_batches(&self) -> impl Iterator<Item = &Batch> {
        self.pending.iter()
    }

    /// Freezes the current module settings into a new batch.
    ///
    /// Modules without parameters are left out. Graph operators are keyed
    /// `name#node` (see [`node_key`]), so same-named nodes keep their own
    /// settings.
    pub fn snapshot(&self) -> Batch {
        let mut settings = vec![
            (self.initialization.name().to_string(), self.initialization.parameters()),
            (self.manager.name().to_string(), self.manager.parameters()),
        ];
        settings.extend(
            self.graph
                .operators()
                .map(|(id, op)| (node_key(op.name(), id), op.parameters())),
        );
        settings.extend(self.criteria.iter().map(|c| (c.name().to_string(), c.parameters())));

        settings
            .into_iter()
            .filter(|(_, params)| !params.is_empty())
            .fold(
                Batch::new(self.next_index(), self.config.runs_per_batch, self.config.seed),
                |batch, (name, params)| batch.with_settings(name, params),
            )
    }

    /// Queues a batch. It is renumbered to follow the batches already queued.
    pub fn queue(&mut self, batch: Batch) {
        let index = self.next_index();
        self.pending.push_back(batch.renumbered(index));
    }

    /// Stages a batch with `params` applied on top of the current settings
    /// of `module`, and marks the schedule edited.
    ///
    /// A plain name edits every module with that name; `name#node` edits a
    /// single graph node.
    pub fn edit(&mut self, module: &str, params: &ParameterSet) -> Result<()> {
        let targets = self.module_targets(module);
        if targets.is_empty() {
            return Err(EngineError::Configuration(format!("no module named '{module}'")));
        }
        let mut batch = self.snapshot();
        for (key, mut current) in targets {
            current.update(params)?;
            batch = batch.with_settings(key, current);
        }
        self.queue(batch);
        self.edited = true;
        Ok(())
    }

    /// Validates the whole module set without creating any individual.
    pub fn check(&self) -> Result<()> {
        self.config.validate().map_err(EngineError::Configuration)?;
        if self.criteria.is_empty() && self.config.max_generations_guard.is_none() {
            return Err(EngineError::Configuration(
                "runs need a stopping criterion or a generation guard".into(),
            ));
        }

        let env = Environment {
            fitness: &*self.fitness,
            space: &*self.space,
        };
        let init = &*self.initialization;
        if init.in_ports() != 0 || init.out_ports() != 1 {
            return Err(GraphError::Syntax {
                node: init.name().to_string(),
                message: format!(
                    "initialization needs 0 in-ports and 1 out-port, has {} and {}",
                    init.in_ports(),
                    init.out_ports()
                ),
            }
            .into());
        }
        init.check_syntax()?;
        init.test_environment(&env)?;
        self.graph.test_schedule(&env)?;
        self.manager.test_environment(&env)?;
        for criterion in &self.criteria {
            criterion.test_environment(&env)?;
        }
        Ok(())
    }

    /// Validates, then executes every queued batch.
    ///
    /// With nothing queued, runs one batch from [`snapshot`](Self::snapshot).
    /// Configuration errors, including batch settings naming unknown
    /// modules or slots, are returned before anything runs and leave the
    /// queue untouched. A batch whose values are rejected when applied is
    /// skipped and reported. Runtime errors and listener failures on run
    /// events abort only the run they occur in; listener failures on the
    /// schedule and batch events end the call.
    pub fn run(&mut self) -> Result<ScheduleReport> {
        self.check()?;
        if self.pending.is_empty() {
            let batch = self.snapshot();
            self.queue(batch);
        }
        for batch in &self.pending {
            self.validate_batch(batch)?;
        }

        let change = if !self.started {
            Some(ScheduleChange::Started)
        } else if self.edited {
            Some(ScheduleChange::Edited)
        } else {
            None
        };
        self.started = true;
        self.edited = false;
        if let Some(change) = change {
            self.fire(Event::Schedule(ScheduleEvent {
                source: self.source,
                change,
            }))?;
        }

        let outcome = self.run_batches();
        self.stop.clear();
        outcome
    }

    fn run_batches(&mut self) -> Result<ScheduleReport> {
        let mut report = ScheduleReport::default();
        while let Some(batch) = self.pending.pop_front() {
            let index = batch.index();
            self.next_batch = index.next();
            if let Err(err) = self.apply_settings(&batch).and_then(|()| self.check()) {
                log::warn!("{index}: rejected: {err}");
                report.rejected.push(RejectedBatch {
                    batch: index,
                    reason: err.to_string(),
                });
                continue;
            }
            let batch = Arc::new(batch);

            log::info!("{index}: starting {} runs", batch.runs());
            self.fire(Event::Batch(BatchEvent {
                source: self.source,
                batch: index,
                phase: BatchPhase::Started,
            }))?;

            let mut run = index.first_run();
            for _ in 0..batch.runs() {
                if self.stop.is_stop_requested() {
                    break;
                }
                report.runs.push(self.run_once(&batch, run));
                run = run.next();
            }

            self.fire(Event::Batch(BatchEvent {
                source: self.source,
                batch: index,
                phase: BatchPhase::Finished,
            }))?;
            log::info!("{index}: finished");

            if self.stop.is_stop_requested() {
                log::info!("stop requested, {} batches left queued", self.pending.len());
                break;
            }
        }
        Ok(report)
    }

    fn run_once(&mut self, batch: &Arc<Batch>, run: RunIndex) -> RunReport {
        let seed = batch.seed().seed_for(self.runs_started);
        self.runs_started += 1;
        self.rng.reseed(seed);
        self.stop.clear_skip();
        self.initialization.reset();
        self.graph.reset();
        self.manager.reset();
        for criterion in &mut self.criteria {
            criterion.reset();
        }
        log::info!("{run}: starting with seed {seed}");

        let mut generation = run.first_generation();
        let status = match self.evolve(batch, &mut generation) {
            Ok(status) => status,
            Err(err) => {
                if err.is_run_fatal() {
                    log::warn!("{generation}: run aborted: {err}");
                } else {
                    log::warn!("{generation}: run aborted by a configuration error: {err}");
                }
                RunStatus::Aborted {
                    reason: err.to_string(),
                }
            }
        };

        let best_fitness = self.manager.population().best_fitness(&*self.fitness).ok();
        let phase = match status {
            RunStatus::Completed => RunPhase::Completed,
            RunStatus::Aborted { .. } => RunPhase::Aborted,
        };
        let ending = self.fire(Event::Run(RunEvent {
            source: self.source,
            run,
            phase,
        }));
        let finalize = self.fire(Event::Run(RunEvent {
            source: self.source,
            run,
            phase: RunPhase::Finalize,
        }));
        let status = match ending.and(finalize) {
            Ok(()) => status,
            Err(err) => {
                log::warn!("{run}: listener failed while ending the run: {err}");
                RunStatus::Aborted {
                    reason: err.to_string(),
                }
            }
        };

        log::info!("{run}: {status:?} after {} generations", generation.generation);
        RunReport {
            run,
            seed,
            status,
            generations: generation.generation,
            best_fitness,
        }
    }

    /// The generation loop. Errors abort the run.
    fn evolve(&mut self, batch: &Arc<Batch>, generation: &mut GenerationIndex) -> Result<RunStatus> {
        {
            let mut ctx = Context::new(&mut self.rng, &*self.fitness, &*self.space, *generation);
            self.manager.init_population(&mut *self.initialization, &mut ctx)?;
        }
        self.fire(Event::Run(RunEvent {
            source: self.source,
            run: generation.run,
            phase: RunPhase::Started(Arc::clone(batch)),
        }))?;
        self.publish_lists(*generation)?;

        loop {
            if self.stop.is_stop_requested() {
                return Ok(aborted("stop requested"));
            }
            if self.stop.is_skip_requested() {
                return Ok(aborted("skip requested"));
            }

            let next = generation.next();
            {
                let mut ctx = Context::new(&mut self.rng, &*self.fitness, &*self.space, next);
                self.manager.create_new_generation(&mut self.graph, &mut ctx)?;
            }
            *generation = next;
            log::debug!("{next}: {} individuals", self.manager.population().len());

            self.fire(Event::Generation(GenerationEvent {
                source: self.source,
                generation: next,
            }))?;
            self.publish_lists(next)?;

            let state = StopState {
                generation: next,
                population: self.manager.population(),
                fitness: &*self.fitness,
            };
            for criterion in &mut self.criteria {
                if criterion.should_stop(&state)? {
                    log::debug!("{next}: '{}' met", criterion.name());
                    return Ok(RunStatus::Completed);
                }
            }
            if self.config.max_generations_guard.is_some_and(|cap| next.generation >= cap) {
                log::warn!("{next}: generation guard reached");
                return Ok(RunStatus::Completed);
            }
        }
    }

    fn publish_lists(&mut self, generation: GenerationIndex) -> Result<()> {
        for (label, list) in self.manager.drain_emitted() {
            self.fire(Event::IndividualList(IndividualListEvent {
                source: self.source,
                generation,
                label,
                list,
            }))?;
        }
        Ok(())
    }

    /// Checks that every settings entry of `batch` names a module and fits
    /// its parameter slots.
    fn validate_batch(&self, batch: &Batch) -> Result<()> {
        for module in batch.modules() {
            let Some(params) = batch.settings(module) else {
                continue;
            };
            let targets = self.module_targets(module);
            if targets.is_empty() {
                return Err(unknown_module(batch, module));
            }
            for (_, mut current) in targets {
                current.update(params)?;
            }
        }
        Ok(())
    }

    fn apply_settings(&mut self, batch: &Batch) -> Result<()> {
        for module in batch.modules() {
            let Some(params) = batch.settings(module) else {
                continue;
            };
            let mut matched = false;
            if self.initialization.name() == module {
                self.initialization.configure(params)?;
                matched = true;
            }
            if self.manager.name() == module {
                self.manager.configure(params)?;
                matched = true;
            }
            let nodes: Vec<NodeId> = self
                .graph
                .operators()
                .filter(|(id, op)| addresses(module, op.name(), *id))
                .map(|(id, _)| id)
                .collect();
            for id in nodes {
                if let Some(op) = self.graph.operator_mut(id) {
                    op.configure(params)?;
                    matched = true;
                }
            }
            for criterion in &mut self.criteria {
                if criterion.name() == module {
                    criterion.configure(params)?;
                    matched = true;
                }
            }
            if !matched {
                return Err(unknown_module(batch, module));
            }
        }
        Ok(())
    }

    /// Settings key and current parameters of every module `key` addresses.
    fn module_targets(&self, key: &str) -> Vec<(String, ParameterSet)> {
        let mut targets = Vec::new();
        if self.initialization.name() == key {
            targets.push((key.to_string(), self.initialization.parameters()));
        }
        if self.manager.name() == key {
            targets.push((key.to_string(), self.manager.parameters()));
        }
        for (id, op) in self.graph.operators() {
            if addresses(key, op.name(), id) {
                targets.push((node_key(op.name(), id), op.parameters()));
            }
        }
        for criterion in &self.criteria {
            if criterion.name() == key {
                targets.push((key.to_string(), criterion.parameters()));
            }
        }
        targets
    }

    fn next_index(&self) -> BatchIndex {
        self.pending.back().map_or(self.next_batch, |b| b.index().next())
    }

    fn fire(&mut self, event: Event<G>) -> Result<()> {
        self.events.fire(&event)
    }
}

/// Batch settings key of a graph node: `name#index`.
pub fn node_key(name: &str, node: NodeId) -> String {
    format!("{name}#{}", node.index())
}

/// `key` is either the operator name or its node key.
fn addresses(key: &str, name: &str, node: NodeId) -> bool {
    key == name || key == node_key(name, node)
}

fn unknown_module(batch: &Batch, module: &str) -> EngineError {
    EngineError::Configuration(format!(
        "batch {} has settings for unknown module '{module}'",
        batch.index()
    ))
}

fn aborted(reason: &str) -> RunStatus {
    RunStatus::Aborted {
        reason: reason.to_string(),
    }
}
