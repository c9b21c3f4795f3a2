//! Publish/subscribe registry for watcher events

use crate::job::{Document, JobState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Category a subscriber registers for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Done,
    Error,
    Document,
}

/// Event delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// One document, either newly arrived or replayed by a catch-up
    Document(Document),

    /// The job completed; carries everything accumulated by the session
    Done {
        status: JobState,
        documents: Vec<Document>,
    },

    /// The job failed; carries what was accumulated so far
    Error {
        status: JobState,
        documents: Vec<Document>,
        error: String,
    },
}

impl WatchEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Document(_) => EventKind::Document,
            Self::Done { .. } => EventKind::Done,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

type Callback = Box<dyn FnMut(&WatchEvent) + Send>;

/// A registered callback; shared so dispatch can run it outside the registry lock
type SharedCallback = Arc<Mutex<Callback>>;

/// Ordered callback lists keyed by event category
#[derive(Default)]
pub struct SubscriberRegistry {
    handlers: HashMap<EventKind, Vec<SharedCallback>>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("done", &self.count(EventKind::Done))
            .field("error", &self.count(EventKind::Error))
            .field("document", &self.count(EventKind::Document))
            .finish()
    }
}

impl SubscriberRegistry {
    pub fn subscribe<F>(&mut self, kind: EventKind, callback: F)
    where
        F: FnMut(&WatchEvent) + Send + 'static,
    {
        let callback: Callback = Box::new(callback);
        self.handlers
            .entry(kind)
            .or_default()
            .push(Arc::new(Mutex::new(callback)));
    }

    /// Callbacks currently registered for a category, in registration order
    fn snapshot(&self, kind: EventKind) -> Vec<SharedCallback> {
        self.handlers.get(&kind).cloned().unwrap_or_default()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}

/// Shared handle to a session's subscribers
///
/// Clones refer to the same registry, so callers can subscribe from any task
/// before or while the watcher is connected, including from inside a
/// callback. A callback registered during a dispatch first fires on the next
/// matching event.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    registry: Arc<Mutex<SubscriberRegistry>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for one event category
    pub fn on<F>(&self, kind: EventKind, callback: F)
    where
        F: FnMut(&WatchEvent) + Send + 'static,
    {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe(kind, callback);
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count(kind)
    }

    /// Invokes every callback registered for the event's category, in registration order
    ///
    /// The registry lock is released before any callback runs.
    pub(crate) fn dispatch(&self, event: &WatchEvent) {
        let callbacks = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot(event.kind());

        for callback in callbacks {
            let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
            (*callback)(event);
        }
    }
}
