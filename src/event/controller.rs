//! Listener registry and synchronous dispatch.

use std::sync::{Arc, Mutex};

use super::types::{
    BatchEvent, Event, EventKind, GenerationEvent, IndividualListEvent, RunEvent, ScheduleEvent, SourceId,
};
use crate::error::{EngineError, Result};

/// Receives lifecycle events.
///
/// Every handler defaults to a no-op, so a listener implements only what it
/// needs. Returning an error aborts the rest of the dispatch and fails the
/// lifecycle step that fired the event.
///
/// Listeners that must be inspected after a run are usually registered as
/// `Arc<Mutex<L>>`, which implements `Listener` by locking for each call.
pub trait Listener<G>: Send {
    /// Name used in error messages and logs.
    fn name(&self) -> &str {
        "listener"
    }

    fn on_schedule(&mut self, _event: &ScheduleEvent) -> Result<()> {
        Ok(())
    }

    fn on_batch(&mut self, _event: &BatchEvent) -> Result<()> {
        Ok(())
    }

    fn on_run(&mut self, _event: &RunEvent) -> Result<()> {
        Ok(())
    }

    fn on_generation(&mut self, _event: &GenerationEvent) -> Result<()> {
        Ok(())
    }

    fn on_individual_list(&mut self, _event: &IndividualListEvent<G>) -> Result<()> {
        Ok(())
    }
}

impl<G, L: Listener<G>> Listener<G> for Arc<Mutex<L>> {
    fn name(&self) -> &str {
        "shared listener"
    }

    fn on_schedule(&mut self, event: &ScheduleEvent) -> Result<()> {
        self.lock().unwrap_or_else(|e| e.into_inner()).on_schedule(event)
    }

    fn on_batch(&mut self, event: &BatchEvent) -> Result<()> {
        self.lock().unwrap_or_else(|e| e.into_inner()).on_batch(event)
    }

    fn on_run(&mut self, event: &RunEvent) -> Result<()> {
        self.lock().unwrap_or_else(|e| e.into_inner()).on_run(event)
    }

    fn on_generation(&mut self, event: &GenerationEvent) -> Result<()> {
        self.lock().unwrap_or_else(|e| e.into_inner()).on_generation(event)
    }

    fn on_individual_list(&mut self, event: &IndividualListEvent<G>) -> Result<()> {
        self.lock().unwrap_or_else(|e| e.into_inner()).on_individual_list(event)
    }
}

/// Handle of a listener owned by an [`EventController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Registration {
    listener: ListenerId,
    kind: EventKind,
    source: SourceId,
}

/// Registry of `(listener, kind, source)` subscriptions.
///
/// [`fire`](Self::fire) calls every matching listener on the calling thread,
/// in registration order, before returning. There is no queue. Registering
/// the same triple twice has no effect.
pub struct EventController<G> {
    listeners: Vec<Option<Box<dyn Listener<G>>>>,
    registrations: Vec<Registration>,
    next_source: u64,
}

impl<G> EventController<G> {
    /// Creates an empty controller.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            registrations: Vec::new(),
            next_source: 0,
        }
    }

    /// Allocates a fresh source identity.
    pub fn new_source(&mut self) -> SourceId {
        let id = SourceId(self.next_source);
        self.next_source += 1;
        id
    }

    /// Takes ownership of a listener. It receives nothing until registered.
    pub fn add_listener<L: Listener<G> + 'static>(&mut self, listener: L) -> ListenerId {
        self.listeners.push(Some(Box::new(listener)));
        ListenerId(self.listeners.len() - 1)
    }

    /// Subscribes `listener` to events of `kind` raised by `source`.
    pub fn register(&mut self, listener: ListenerId, kind: EventKind, source: SourceId) -> Result<()> {
        if !matches!(self.listeners.get(listener.0), Some(Some(_))) {
            return Err(EngineError::Configuration(format!(
                "unknown listener #{}",
                listener.0
            )));
        }
        let reg = Registration {
            listener,
            kind,
            source,
        };
        if !self.registrations.contains(&reg) {
            self.registrations.push(reg);
        }
        Ok(())
    }

    /// Subscribes `listener` to every kind raised by `source`.
    pub fn register_all(&mut self, listener: ListenerId, source: SourceId) -> Result<()> {
        for kind in EventKind::ALL {
            self.register(listener, kind, source)?;
        }
        Ok(())
    }

    /// Removes one subscription. Returns `true` if it existed.
    pub fn unregister(&mut self, listener: ListenerId, kind: EventKind, source: SourceId) -> bool {
        let before = self.registrations.len();
        self.registrations
            .retain(|r| !(r.listener == listener && r.kind == kind && r.source == source));
        self.registrations.len() != before
    }

    /// Drops every subscription of `listener` and hands the listener back.
    pub fn remove_listener(&mut self, listener: ListenerId) -> Option<Box<dyn Listener<G>>> {
        self.registrations.retain(|r| r.listener != listener);
        self.listeners.get_mut(listener.0).and_then(Option::take)
    }

    /// Number of active subscriptions.
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Dispatches `event` to every matching subscription.
    ///
    /// Stops at the first failing listener and returns its error.
    pub fn fire(&mut self, event: &Event<G>) -> Result<()> {
        let kind = event.kind();
        let source = event.source();
        for reg in &self.registrations {
            if reg.kind != kind || reg.source != source {
                continue;
            }
            let Some(Some(listener)) = self.listeners.get_mut(reg.listener.0) else {
                continue;
            };
            let outcome = match event {
                Event::Schedule(e) => listener.on_schedule(e),
                Event::Batch(e) => listener.on_batch(e),
                Event::Run(e) => listener.on_run(e),
                Event::Generation(e) => listener.on_generation(e),
                Event::IndividualList(e) => listener.on_individual_list(e),
            };
            if let Err(err) = outcome {
                log::warn!("{} failed on {:?} event: {}", listener.name(), kind, err);
                return Err(err);
            }
        }
        Ok(())
    }
}

impl<G> Default for EventController<G> {
    fn default() -> Self {
        Self::new()
    }
}
