//! Auth: hosted auth service client and the session-change channel.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session store only sees the `AuthBackend` trait: a one-shot snapshot
//! plus a push subscription. `AuthClient` is the HTTP implementation; tests
//! drive the store with in-memory backends.

pub mod client;
pub mod listeners;
pub mod persist;
pub mod refresh;
pub mod types;

use std::sync::Arc;

pub use client::AuthClient;
pub use listeners::{Listeners, SessionCallback, Subscription};
pub use types::{AuthError, AuthEvent, AuthUser, Session, SignUpOutcome};

/// Source of truth for the signed-in session.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session snapshot, one-shot.
    async fn current_session(&self) -> Result<Option<Arc<Session>>, AuthError>;

    /// Register for pushed session changes until the handle is released.
    fn on_session_change(&self, callback: SessionCallback) -> Subscription;
}
