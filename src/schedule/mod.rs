//! Batch/run/generation orchestration.
//!
//! - [`Schedule`]: owns the modules and runs the lifecycle
//! - [`Batch`]: frozen module settings for a block of runs
//! - [`StoppingCriterion`]: decides when a run is complete
//! - [`StopHandle`]: cooperative skip/stop from another thread

mod batch;
mod config;
mod index;
mod runner;
mod stopping;

pub use batch::Batch;
pub use config::ScheduleConfig;
pub use index::{BatchIndex, GenerationIndex, RunIndex};
pub use runner::{node_key, RejectedBatch, RunReport, RunStatus, Schedule, ScheduleReport, StopHandle};
pub use stopping::{FitnessReached, MaxGenerations, OptimumReached, Stagnation, StopState, StoppingCriterion};
