//! Session store: single holder of the client-side session.
//!
//! ARCHITECTURE
//! ============
//! `init` registers the backend subscription first, then spawns the one-shot
//! snapshot fetch, so no notification can slip between the two. Both writers
//! go through the watch channel's `send_if_modified`, which serializes them:
//!
//! - a notification always replaces the state and clears loading;
//! - the snapshot only lands if no notification has been applied yet, so a
//!   slow snapshot never overwrites a newer pushed session.
//!
//! TRADE-OFFS
//! ==========
//! Consumers hold a `watch` receiver and therefore observe the latest state.
//! A consumer that is slower than a burst of notifications sees the final
//! state of the burst rather than every intermediate one.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{SessionHandle, SessionState};
use crate::auth::{AuthBackend, AuthEvent, Session, Subscription};

struct Shared {
    state: watch::Sender<SessionState>,
    torn_down: AtomicBool,
    notified: AtomicBool,
}

impl Shared {
    fn apply_notification(&self, event: AuthEvent, session: Option<Arc<Session>>) {
        let applied = self.state.send_if_modified(|state| {
            if self.torn_down.load(Ordering::SeqCst) {
                return false;
            }
            self.notified.store(true, Ordering::SeqCst);
            *state = SessionState::resolved(session);
            true
        });
        if applied {
            tracing::debug!(%event, "session store applied notification");
        } else {
            tracing::debug!(%event, "session store torn down; notification ignored");
        }
    }

    fn apply_snapshot(&self, session: Option<Arc<Session>>) {
        self.state.send_if_modified(|state| {
            if self.torn_down.load(Ordering::SeqCst) || self.notified.load(Ordering::SeqCst) {
                return false;
            }
            *state = SessionState::resolved(session);
            true
        });
    }
}

/// Owner of the session state. Dropping it tears it down.
pub struct SessionStore {
    shared: Arc<Shared>,
    subscription: Mutex<Option<Subscription>>,
    snapshot_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// Subscribe to `backend` and start resolving the initial snapshot.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(backend: Arc<dyn AuthBackend>) -> Self {
        let (tx, _rx) = watch::channel(SessionState::initial());
        let shared = Arc::new(Shared { state: tx, torn_down: AtomicBool::new(false), notified: AtomicBool::new(false) });

        let on_change = shared.clone();
        let subscription =
            backend.on_session_change(Box::new(move |event, session| on_change.apply_notification(event, session)));

        let on_snapshot = shared.clone();
        let snapshot_task = tokio::spawn(async move {
            let session = match backend.current_session().await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(error = %e, "initial session fetch failed; continuing signed out");
                    None
                }
            };
            on_snapshot.apply_snapshot(session);
        });

        Self {
            shared,
            subscription: Mutex::new(Some(subscription)),
            snapshot_task: Mutex::new(Some(snapshot_task)),
        }
    }

    /// Read-only handle for consumers.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.shared.state.subscribe())
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    /// Release the backend subscription. Idempotent; later notifications are ignored.
    pub fn teardown(&self) {
        if self.shared.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self
            .snapshot_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        if let Some(subscription) = self
            .subscription
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            subscription.unsubscribe();
        }
        tracing::debug!("session store torn down");
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.shared.torn_down.load(Ordering::SeqCst)
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.teardown();
    }
}
