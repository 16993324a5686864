//! HTTP client for the hosted auth service (`/auth/v1`).
//!
//! ARCHITECTURE
//! ============
//! The client owns the authoritative copy of the credentials. Every change
//! goes through `apply`, which swaps the cached `Arc<Session>`, writes it to
//! persistence and notifies subscribers while still holding the session lock,
//! so subscribers see changes in exactly the order they were made.
//!
//! ERROR HANDLING
//! ==============
//! Persistence failures are logged and never fail the auth call: the session
//! is still valid in memory. A rejected refresh signs the user out locally.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::AuthBackend;
use super::listeners::{Listeners, SessionCallback, Subscription};
use super::persist::SessionPersistence;
use super::types::{
    AuthError, AuthEvent, Session, SignUpOutcome, parse_error_message, parse_session, parse_sign_up, unix_now,
};
use crate::config::BackendConfig;

pub struct AuthClient {
    http: reqwest::Client,
    auth_url: String,
    anon_key: String,
    refresh_margin_secs: u64,
    session: Mutex<Option<Arc<Session>>>,
    persistence: Arc<dyn SessionPersistence>,
    listeners: Listeners,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: &BackendConfig, http: reqwest::Client, persistence: Arc<dyn SessionPersistence>) -> Self {
        Self {
            http,
            auth_url: auth_endpoint(&config.url),
            anon_key: config.anon_key.clone(),
            refresh_margin_secs: config.refresh_margin_secs,
            session: Mutex::new(None),
            persistence,
            listeners: Listeners::new(),
        }
    }

    /// Session currently held in memory, without touching the network or disk.
    pub async fn cached_session(&self) -> Option<Arc<Session>> {
        self.session.lock().await.clone()
    }

    /// Sign in with email + password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` for bad credentials, or a request/parse error.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Arc<Session>, AuthError> {
        let payload = serde_json::json!({ "email": email, "password": password });
        let body = self.post(&token_url(&self.auth_url, "password"), &payload, None).await?;
        let session = Arc::new(parse_session(&body, unix_now())?);

        let mut slot = self.session.lock().await;
        self.apply(&mut slot, Some(session.clone()), AuthEvent::SignedIn).await;
        tracing::info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    /// Create an account. Depending on project settings the account is either
    /// signed in straight away or waits for email confirmation.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` if the service refuses the sign-up.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let payload = serde_json::json!({ "email": email, "password": password });
        let body = self.post(&format!("{}/signup", self.auth_url), &payload, None).await?;
        let outcome = parse_sign_up(&body, unix_now())?;

        match &outcome {
            SignUpOutcome::SignedIn(session) => {
                let mut slot = self.session.lock().await;
                self.apply(&mut slot, Some(session.clone()), AuthEvent::SignedIn).await;
                tracing::info!(user_id = %session.user.id, "signed up and signed in");
            }
            SignUpOutcome::ConfirmationRequired { user } => {
                tracing::info!(user_id = %user.id, "signed up; email confirmation pending");
            }
        }
        Ok(outcome)
    }

    /// Exchange the refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoSession` when signed out. A rejected refresh
    /// token signs the user out and returns the rejection.
    pub async fn refresh_session(&self) -> Result<Arc<Session>, AuthError> {
        let mut slot = self.session.lock().await;
        self.refresh_locked(&mut slot).await
    }

    /// Refresh only when the held session is inside the refresh margin.
    /// Returns whether a refresh happened.
    ///
    /// # Errors
    ///
    /// Propagates refresh failures.
    pub async fn refresh_if_due(&self) -> Result<bool, AuthError> {
        let mut slot = self.session.lock().await;
        let due = slot
            .as_ref()
            .is_some_and(|s| s.expires_within(self.refresh_margin_secs, unix_now()));
        if !due {
            return Ok(false);
        }
        self.refresh_locked(&mut slot).await?;
        Ok(true)
    }

    /// Sign out. The local session is dropped even if the logout call fails.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature leaves room for strict revocation.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let mut slot = self.session.lock().await;
        let Some(current) = slot.clone() else {
            return Ok(());
        };

        let logout_url = format!("{}/logout", self.auth_url);
        if let Err(e) = self
            .post(&logout_url, &serde_json::json!({}), Some(&current.access_token))
            .await
        {
            tracing::warn!(error = %e, "remote logout failed; clearing local session anyway");
        }

        self.apply(&mut slot, None, AuthEvent::SignedOut).await;
        tracing::info!(user_id = %current.user.id, "signed out");
        Ok(())
    }

    /// Number of live session-change subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    async fn refresh_locked(&self, slot: &mut Option<Arc<Session>>) -> Result<Arc<Session>, AuthError> {
        let refresh_token = slot
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(AuthError::NoSession)?;

        let payload = serde_json::json!({ "refresh_token": refresh_token });
        match self.post(&token_url(&self.auth_url, "refresh_token"), &payload, None).await {
            Ok(body) => {
                let session = Arc::new(parse_session(&body, unix_now())?);
                self.apply(slot, Some(session.clone()), AuthEvent::TokenRefreshed).await;
                tracing::debug!(expires_at = session.expires_at, "session refreshed");
                Ok(session)
            }
            Err(e) if e.is_credential_rejection() => {
                tracing::warn!(error = %e, "refresh token rejected; signing out");
                self.apply(slot, None, AuthEvent::SignedOut).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn apply(&self, slot: &mut Option<Arc<Session>>, next: Option<Arc<Session>>, event: AuthEvent) {
        let stored = match &next {
            Some(session) => self.persistence.save(session).await,
            None => self.persistence.clear().await,
        };
        if let Err(e) = stored {
            tracing::warn!(error = %e, %event, "session persistence failed");
        }
        slot.clone_from(&next);
        self.listeners.emit(event, next);
    }

    async fn post(&self, url: &str, payload: &serde_json::Value, bearer: Option<&str>) -> Result<String, AuthError> {
        let mut request = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(payload);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(AuthError::Rejected { status, message: parse_error_message(&text) });
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl AuthBackend for AuthClient {
    async fn current_session(&self) -> Result<Option<Arc<Session>>, AuthError> {
        let mut slot = self.session.lock().await;
        if slot.is_none() {
            if let Some(stored) = self.persistence.load().await? {
                tracing::debug!(user_id = %stored.user.id, "restored persisted session");
                *slot = Some(Arc::new(stored));
            }
        }

        let due = slot
            .as_ref()
            .is_some_and(|s| s.expires_within(self.refresh_margin_secs, unix_now()));
        if due {
            match self.refresh_locked(&mut slot).await {
                Ok(session) => return Ok(Some(session)),
                Err(e) if e.is_credential_rejection() => return Ok(None),
                Err(e) => return Err(e),
            }
        }
        Ok(slot.clone())
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.listeners.register(callback)
    }
}

fn auth_endpoint(base_url: &str) -> String {
    format!("{base_url}/auth/v1")
}

fn token_url(auth_url: &str, grant_type: &str) -> String {
    format!("{auth_url}/token?grant_type={grant_type}")
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
