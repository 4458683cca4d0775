//! Observer registry for queue events.
//!
//! Listeners subscribe to one [`QueueEventKind`] and are called synchronously,
//! on the publishing thread, in subscription order. Publishing snapshots the
//! listener list first, so a listener may subscribe or unsubscribe from inside
//! its own callback; the change applies from the next publish.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use jibri_queue_core::{QueueEvent, QueueEventKind};

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription#{}", self.0)
    }
}

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(SubscriptionId, QueueEventKind, Listener)>,
}

/// Synchronous publish/subscribe registry.
#[derive(Default)]
pub struct EventBus {
    registry: Mutex<Registry>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.len()).finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener` for events of `kind`.
    pub fn subscribe<F>(&self, kind: QueueEventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, kind, Arc::new(listener)));
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry();
        let before = registry.listeners.len();
        registry.listeners.retain(|(sub, _, _)| *sub != id);
        registry.listeners.len() != before
    }

    /// Deliver `event` to every listener of its kind. Returns how many ran.
    pub fn publish(&self, event: &QueueEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<Listener> = self
            .registry()
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();

        for listener in &targets {
            listener(event);
        }

        targets.len()
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.registry().listeners.clear();
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.registry().listeners.len()
    }

    /// True if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
