//! Event records.
//!
//! Events are immutable once built. Each carries the [`SourceId`] of the
//! component that raised it.

use std::fmt;
use std::sync::Arc;

use crate::population::IndividualList;
use crate::schedule::{Batch, BatchIndex, GenerationIndex, RunIndex};

/// Identity of an event-raising component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub(crate) u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Event categories a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Schedule,
    Batch,
    Run,
    Generation,
    IndividualList,
}

impl EventKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Schedule,
        EventKind::Batch,
        EventKind::Run,
        EventKind::Generation,
        EventKind::IndividualList,
    ];
}

/// Why the schedule (re)started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleChange {
    /// First start.
    Started,
    /// Start after the configuration was edited.
    Edited,
}

/// Raised once per `Schedule::run` call, before the first batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEvent {
    pub source: SourceId,
    pub change: ScheduleChange,
}

/// Batch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Started,
    Finished,
}

/// Raised when a batch starts and when all its runs are done.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEvent {
    pub source: SourceId,
    pub batch: BatchIndex,
    pub phase: BatchPhase,
}

/// Run lifecycle step.
#[derive(Debug, Clone, PartialEq)]
pub enum RunPhase {
    /// The initial population exists. Carries the active batch.
    Started(Arc<Batch>),
    /// A stopping criterion was met.
    Completed,
    /// The run was skipped, stopped, or failed.
    Aborted,
    /// Always follows `Completed` or `Aborted`; listeners drop per-run state.
    Finalize,
}

/// Raised at every run lifecycle step.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEvent {
    pub source: SourceId,
    pub run: RunIndex,
    pub phase: RunPhase,
}

/// Raised after each new generation exists.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationEvent {
    pub source: SourceId,
    pub generation: GenerationIndex,
}

/// Hands a list (a population, an island, a migrant set) to listeners.
///
/// The list is a snapshot; keep a clone to retain it past the handler.
#[derive(Debug, Clone)]
pub struct IndividualListEvent<G> {
    pub source: SourceId,
    pub generation: GenerationIndex,
    pub label: String,
    pub list: IndividualList<G>,
}

/// Any event.
#[derive(Debug, Clone)]
pub enum Event<G> {
    Schedule(ScheduleEvent),
    Batch(BatchEvent),
    Run(RunEvent),
    Generation(GenerationEvent),
    IndividualList(IndividualListEvent<G>),
}

impl<G> Event<G> {
    /// Category of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Schedule(_) => EventKind::Schedule,
            Event::Batch(_) => EventKind::Batch,
            Event::Run(_) => EventKind::Run,
            Event::Generation(_) => EventKind::Generation,
            Event::IndividualList(_) => EventKind::IndividualList,
        }
    }

    /// Component that raised this event.
    pub fn source(&self) -> SourceId {
        match self {
            Event::Schedule(e) => e.source,
            Event::Batch(e) => e.source,
            Event::Run(e) => e.source,
            Event::Generation(e) => e.source,
            Event::IndividualList(e) => e.source,
        }
    }
}
