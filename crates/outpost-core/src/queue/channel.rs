//! Event channel: observer registry with per-listener isolation.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::warn;

use crate::domain::QueueEvent;

/// A registered observer.
pub type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Registry of listeners (subscription id -> callback).
///
/// Design:
/// - Emission is synchronous, in subscription order.
/// - The registry lock is not held while listeners run, so a listener may
///   subscribe / unsubscribe / read the queue.
/// - A panicking listener is logged and skipped; the rest still see the event.
#[derive(Default)]
pub struct EventChannel {
    listeners: Mutex<BTreeMap<SubscriptionId, Listener>>,
    next_id: AtomicU64,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&QueueEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.register(Arc::new(listener))
    }

    /// Registers an already shared listener.
    pub fn register(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, listener);
        id
    }

    /// Returns whether the subscription was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Delivers `event` to every listener. Returns how many listeners panicked.
    pub fn emit(&self, event: &QueueEvent) -> usize {
        let listeners: Vec<(SubscriptionId, Listener)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        let mut failures = 0;
        for (id, listener) in listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if outcome.is_err() {
                failures += 1;
                warn!(
                    subscription = id.0,
                    event = event.kind().as_str(),
                    "event listener panicked; continuing with remaining listeners"
                );
            }
        }
        failures
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    channel: Weak<EventChannel>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, channel: &Arc<EventChannel>) -> Self {
        Self {
            id,
            channel: Arc::downgrade(channel),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether the listener was still registered.
    pub fn unsubscribe(&self) -> bool {
        self.channel
            .upgrade()
            .is_some_and(|channel| channel.unsubscribe(self.id))
    }
}
