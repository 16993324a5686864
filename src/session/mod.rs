//! Process-wide session state and its read-only handle.
//!
//! SYSTEM CONTEXT
//! ==============
//! The route guard and the data layer read the session through
//! `SessionHandle`; only the store's own subscription callback writes it.

pub mod store;


use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::auth::Session;

pub use store::SessionStore;

/// Coarse auth status derived from `SessionState`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// Initial snapshot not resolved yet. Not the same as signed out.
    Loading,
    Unauthenticated,
    Authenticated,
}

/// Snapshot of what the store currently holds.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub session: Option<Arc<Session>>,
    pub loading: bool,
}

impl SessionState {
    /// State before the first snapshot resolves.
    #[must_use]
    pub fn initial() -> Self {
        Self { session: None, loading: true }
    }

    #[must_use]
    pub fn resolved(session: Option<Arc<Session>>) -> Self {
        Self { session, loading: false }
    }

    /// True iff a session is held. Loading is never authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        if self.loading {
            AuthStatus::Loading
        } else if self.session.is_some() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Unauthenticated
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.user.id)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Read-only view of the session store. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub(crate) fn new(rx: watch::Receiver<SessionState>) -> Self {
        Self { rx }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    #[must_use]
    pub fn session(&self) -> Option<Arc<Session>> {
        self.rx.borrow().session.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.rx.borrow().loading
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        self.rx.borrow().user_id()
    }

    /// Wait for the next applied update. Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the initial snapshot (or a notification) has resolved loading.
    pub async fn loaded(&mut self) -> SessionState {
        let resolved = self.rx.wait_for(|s| !s.loading).await.map(|s| s.clone());
        resolved.unwrap_or_else(|_| self.state())
    }

    /// A fresh receiver for `tokio::select!` style consumers.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.rx.clone()
    }
}
