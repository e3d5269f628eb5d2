//! Typed event fabric.
//!
//! Components raise [`Event`]s through an [`EventController`]; listeners
//! subscribe per `(kind, source)` and are called synchronously, in
//! registration order. A failing listener stops the dispatch and its error
//! propagates to whoever fired the event.
//!
//! Listeners receive events by reference and cannot reach the controller
//! while handling one.

mod controller;
mod types;

pub use controller::{EventController, Listener, ListenerId};
pub use types::{
    BatchEvent, BatchPhase, Event, EventKind, GenerationEvent, IndividualListEvent, RunEvent, RunPhase,
    ScheduleChange, ScheduleEvent, SourceId,
};
