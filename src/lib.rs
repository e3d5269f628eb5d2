//! Evolutionary-run execution engine.
//!
//! Drives pluggable evolutionary modules through a batch, run and
//! generation lifecycle:
//!
//! - **Schedule**: owns the modules, validates them up front, and runs
//!   batches of seeded, reproducible runs with cooperative cancellation.
//! - **Events**: typed lifecycle events dispatched synchronously to
//!   registered listeners.
//! - **Operator graph**: a validated dataflow DAG of operators exchanging
//!   individual lists, executed once per generation.
//! - **Population**: shared individuals with tags and memoized fitness,
//!   plus tie-aware randomized rank selection.
//! - **Population managers**: single population, island model with ring
//!   migration, or one independent restart per individual.
//!
//! # Architecture
//!
//! The engine defines no genotype, fitness function or variation operator
//! of its own beyond a few generic built-ins. Problems plug in through
//! [`fitness::FitnessFunction`], [`space::SearchSpace`] and
//! [`graph::Operator`]. All randomness flows from one
//! [`random::RandomSource`] per run, so a seed reproduces the run exactly.

pub mod error;
pub mod event;
pub mod fitness;
pub mod graph;
pub mod manager;
pub mod param;
pub mod population;
pub mod random;
pub mod schedule;
pub mod space;

pub use error::{EngineError, GraphError, RankError, Result};
