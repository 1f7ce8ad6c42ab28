//! Event fan-out to registered listeners.

use crate::frame::EventFrame;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Boxed event callback.
pub type Listener = Box<dyn Fn(&EventFrame) + Send + Sync>;

struct Registration {
    id: u64,
    active: AtomicBool,
    listener: Listener,
}

/// Delivers every inbound event to all registered listeners, in
/// registration order.
///
/// Dispatch iterates a snapshot of the registrations, so listeners may add
/// or remove registrations (their own included) while an event is being
/// delivered. A removed listener is skipped even if it is still in the
/// snapshot. A panicking listener is logged and does not affect the others.
pub struct EventDispatcher {
    next_id: AtomicU64,
    listeners: RwLock<Vec<Arc<Registration>>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener. The returned handle revokes it.
    pub fn add_listener<F>(self: &Arc<Self>, listener: F) -> ListenerHandle
    where
        F: Fn(&EventFrame) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push(Arc::new(Registration {
            id,
            active: AtomicBool::new(true),
            listener: Box::new(listener),
        }));

        ListenerHandle {
            id,
            dispatcher: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|r| r.id == id) {
            Some(index) => {
                let registration = listeners.remove(index);
                registration.active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Deliver an event to every listener. Returns how many were invoked.
    pub fn dispatch(&self, event: &EventFrame) -> usize {
        let snapshot: Vec<Arc<Registration>> = self.listeners.read().clone();
        if snapshot.is_empty() {
            debug!("No listeners for event {}", event.event);
            return 0;
        }

        let mut invoked = 0;
        for registration in snapshot {
            if !registration.active.load(Ordering::Acquire) {
                continue;
            }
            invoked += 1;

            let result = catch_unwind(AssertUnwindSafe(|| (registration.listener)(event)));
            if let Err(panic) = result {
                error!(
                    "Event listener error on {}: {}",
                    event.event,
                    panic_message(panic.as_ref())
                );
            }
        }

        debug!("Dispatched event {} to {} listener(s)", event.event, invoked);
        invoked
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        for registration in self.listeners.write().drain(..) {
            registration.active.store(false, Ordering::Release);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}

/// Removal token for one listener registration.
///
/// Dropping the handle leaves the listener registered.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: u64,
    dispatcher: Weak<EventDispatcher>,
}

impl ListenerHandle {
    /// Revoke the registration. Repeated calls are no-ops.
    ///
    /// Returns `true` if this call removed the listener.
    pub fn remove(&self) -> bool {
        match self.dispatcher.upgrade() {
            Some(dispatcher) => dispatcher.remove(self.id),
            None => false,
        }
    }
}
