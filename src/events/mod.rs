// src/events/mod.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::models::{Session, Settings};

/// Change-notification topics. Names mirror the persisted event channel:
/// `db:changed`, `session:changed`, `settings:changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    DbChanged,
    SessionChanged,
    SettingsChanged,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::DbChanged => "db:changed",
            Topic::SessionChanged => "session:changed",
            Topic::SettingsChanged => "settings:changed",
        }
    }
}

/// Event payloads. `DbChanged` carries no copy of the document — subscribers
/// read the post-mutation state through the store, which is guaranteed to be
/// fully applied by the time delivery starts.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    DbChanged,
    SessionChanged(Option<Session>),
    SettingsChanged(Settings),
}

impl StoreEvent {
    pub fn topic(&self) -> Topic {
        match self {
            StoreEvent::DbChanged => Topic::DbChanged,
            StoreEvent::SessionChanged(_) => Topic::SessionChanged,
            StoreEvent::SettingsChanged(_) => Topic::SettingsChanged,
        }
    }
}

type Handler = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

struct Entry {
    id: u64,
    topic: Topic,
    handler: Handler,
}

/// Process-wide observer registry. Delivery is synchronous, in subscription
/// order, on the emitting thread — no queuing, no async dispatch. Handlers
/// may subscribe, unsubscribe, or emit re-entrantly: the registry lock is
/// never held while a handler runs.
pub struct EventBus {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
    weak: Weak<EventBus>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            weak: weak.clone(),
        })
    }

    /// Subscribe to one topic. The returned handle unsubscribes explicitly;
    /// dropping it without calling [`Subscription::unsubscribe`] leaves the
    /// handler registered (the page-cleanup contract owns that call).
    pub fn on(
        &self,
        topic: Topic,
        handler: impl Fn(&StoreEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push(Entry { id, topic, handler: Arc::new(handler) });
        Subscription { bus: self.weak.clone(), id }
    }

    pub fn emit(&self, event: &StoreEvent) {
        let topic = event.topic();
        // snapshot under the lock, deliver outside it
        let handlers: Vec<Handler> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.topic == topic)
            .map(|e| Arc::clone(&e.handler))
            .collect();
        for h in handlers {
            h(event);
        }
    }

    fn off(&self, id: u64) {
        self.entries.lock().retain(|e| e.id != id);
    }
}

/// Handle returned by [`EventBus::on`].
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.off(self.id);
        }
    }
}
