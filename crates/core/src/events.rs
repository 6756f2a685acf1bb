use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

type Handler = Arc<dyn Fn() + Send + Sync>;

/// Opaque handle returned by subscriptions, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: u64,
    once: bool,
    handler: Handler,
}

/// Named publish/subscribe fan-out for performance time notifications.
///
/// Held as a field by the components that need it rather than inherited,
/// so the same bus can carry the fixed `timeSync`/`cueChange` notifications
/// alongside one dynamically-named event per cue.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    next_id: Mutex<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every emission of the named event.
    pub fn on<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(name, false, Arc::new(handler))
    }

    /// Subscribe to the next emission of the named event only.
    ///
    /// The subscription is removed before the handler runs, so a handler
    /// that re-enters the bus cannot fire itself a second time.
    pub fn once<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(name, true, Arc::new(handler))
    }

    /// Remove a subscription. Removing an already-removed subscription is a no-op.
    pub fn off(&self, name: &str, id: SubscriptionId) {
        let mut subs = self.subscribers.lock();
        if let Some(list) = subs.get_mut(name) {
            list.retain(|s| s.id != id.0);
            if list.is_empty() {
                subs.remove(name);
            }
        }
    }

    /// Deliver the named event to all current subscribers, in subscription order.
    ///
    /// One-shot subscriptions are unsubscribed before any handler is invoked.
    /// Handlers run outside the bus lock, so they may subscribe, unsubscribe,
    /// or emit without deadlocking.
    pub fn emit(&self, name: &str) {
        let handlers: Vec<Handler> = {
            let mut subs = self.subscribers.lock();
            match subs.get_mut(name) {
                None => return,
                Some(list) => {
                    let handlers = list.iter().map(|s| Arc::clone(&s.handler)).collect();
                    list.retain(|s| !s.once);
                    if list.is_empty() {
                        subs.remove(name);
                    }
                    handlers
                }
            }
        };

        for handler in handlers {
            handler();
        }
    }

    fn subscribe(&self, name: &str, once: bool, handler: Handler) -> SubscriptionId {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };

        self.subscribers
            .lock()
            .entry(name.to_string())
            .or_default()
            .push(Subscriber { id, once, handler });

        SubscriptionId(id)
    }
}
