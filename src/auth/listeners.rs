//! Session-change listener registry.
//!
//! DESIGN
//! ======
//! Callbacks are stored by registration id and invoked in registration order.
//! `emit` snapshots the callback list before invoking so a callback may
//! unsubscribe itself (or others) without deadlocking the registry.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use super::types::{AuthEvent, Session};

/// Callback invoked for every session change.
pub type SessionCallback = Box<dyn Fn(AuthEvent, Option<Arc<Session>>) + Send + Sync>;

type SharedCallback = Arc<dyn Fn(AuthEvent, Option<Arc<Session>>) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: BTreeMap<u64, SharedCallback>,
}

/// Set of active session-change subscribers.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<Mutex<Registry>>,
}

impl Listeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Delivery stops when the returned handle is
    /// unsubscribed or dropped.
    pub fn register(&self, callback: SessionCallback) -> Subscription {
        let mut registry = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.insert(id, Arc::from(callback));
        Subscription { id, registry: Arc::downgrade(&self.inner), active: true }
    }

    /// Deliver one notification to every active subscriber.
    pub fn emit(&self, event: AuthEvent, session: Option<Arc<Session>>) {
        let callbacks: Vec<SharedCallback> = {
            let registry = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            registry.callbacks.values().cloned().collect()
        };
        tracing::debug!(%event, subscribers = callbacks.len(), "session change");
        for callback in callbacks {
            callback(event, session.clone());
        }
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .callbacks
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for one registered callback.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
    active: bool,
}

impl Subscription {
    /// Stop delivery to this subscriber.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            registry.callbacks.remove(&self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
#[path = "listeners_test.rs"]
mod tests;
