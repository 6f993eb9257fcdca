use std::sync::{Arc, Mutex, Weak};

use vstick_proto::{EventCategory, FcEvent};

pub type EventHandler = Arc<dyn Fn(FcEvent) + Send + Sync>;

type RevokeFn = Box<dyn FnOnce() + Send>;

/// A live listener registration. Revoking runs the unregister hook at most
/// once; later calls (and the implicit one on drop) do nothing.
pub struct Subscription {
    category: EventCategory,
    revoke: Mutex<Option<RevokeFn>>,
}

impl Subscription {
    pub fn new(category: EventCategory, revoke: impl FnOnce() + Send + 'static) -> Self {
        Self { category, revoke: Mutex::new(Some(Box::new(revoke))) }
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn is_active(&self) -> bool {
        self.revoke.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Returns true only for the call that actually unregistered.
    pub fn revoke(&self) -> bool {
        let hook = self.revoke.lock().unwrap_or_else(|e| e.into_inner()).take();
        match hook {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.revoke();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("category", &self.category)
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, EventCategory, EventHandler)>,
}

/// Listener registry backends use to fan events out to subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Listeners>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, category: EventCategory, handler: EventHandler) -> Subscription {
        let id = {
            let mut l = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            l.next_id += 1;
            let id = l.next_id;
            l.entries.push((id, category, handler));
            id
        };
        let weak: Weak<Mutex<Listeners>> = Arc::downgrade(&self.inner);
        Subscription::new(category, move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .entries
                    .retain(|(i, _, _)| *i != id);
            }
        })
    }

    /// Handlers run on the caller's thread, outside the registry lock.
    pub fn emit(&self, event: FcEvent) {
        let category = event.category();
        let handlers: Vec<EventHandler> = {
            let l = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            l.entries
                .iter()
                .filter(|(_, c, _)| *c == category)
                .map(|(_, _, h)| h.clone())
                .collect()
        };
        for h in handlers {
            h(event.clone());
        }
    }

    pub fn listener_count(&self, category: EventCategory) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .iter()
            .filter(|(_, c, _)| *c == category)
            .count()
    }
}
