//! Auth types: session bundle, notifications and errors.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by auth client operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The HTTP request to the auth service failed before a response arrived.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The auth service answered with a non-success status.
    #[error("auth rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The auth response body could not be deserialized.
    #[error("auth response parse failed: {0}")]
    Parse(String),

    /// The operation needs a signed-in session and there is none.
    #[error("no active session")]
    NoSession,

    /// Reading or writing the persisted session failed.
    #[error("session storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Rejected { status: 429 | 500..=599, .. })
    }

    /// Whether the auth service refused the credentials themselves.
    #[must_use]
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, Self::Rejected { status: 400..=499, .. }) && !self.retryable()
    }

    /// Stable machine-readable code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_AUTH_REQUEST",
            Self::Rejected { .. } => "E_AUTH_REJECTED",
            Self::Parse(_) => "E_AUTH_PARSE",
            Self::NoSession => "E_NO_SESSION",
            Self::Storage(_) => "E_SESSION_STORAGE",
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Identity attached to a session. Only the id and email are trusted client-side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Cached copy of the credentials the auth service issued.
///
/// Consumers share it as `Arc<Session>`; a new session replaces the old one,
/// it is never edited in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry in seconds since the Unix epoch.
    pub expires_at: u64,
    pub user: AuthUser,
}

impl Session {
    /// True once `now` is within `margin_secs` of expiry (or past it).
    #[must_use]
    pub fn expires_within(&self, margin_secs: u64, now: u64) -> bool {
        self.expires_at <= now.saturating_add(margin_secs)
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Kind of session change pushed to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl AuthEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        }
    }
}

impl std::fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a sign-up call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account is usable immediately and a session was issued.
    SignedIn(std::sync::Arc<Session>),
    /// The account exists but the email must be confirmed before sign-in.
    ConfirmationRequired { user: AuthUser },
}

/// Seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

// =============================================================================
// WIRE PARSING
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    expires_at: Option<u64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: u64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now.saturating_add(secs)))
            .unwrap_or(now);
        Session { access_token: self.access_token, refresh_token: self.refresh_token, expires_at, user: self.user }
    }
}

/// Parse a token grant response into a session.
pub(crate) fn parse_session(json: &str, now: u64) -> Result<Session, AuthError> {
    let token: TokenResponse = serde_json::from_str(json).map_err(|e| AuthError::Parse(e.to_string()))?;
    Ok(token.into_session(now))
}

/// Parse a sign-up response.
///
/// With email confirmation enabled the service returns the bare user object
/// and no tokens.
pub(crate) fn parse_sign_up(json: &str, now: u64) -> Result<SignUpOutcome, AuthError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| AuthError::Parse(e.to_string()))?;
    if value.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(value).map_err(|e| AuthError::Parse(e.to_string()))?;
        return Ok(SignUpOutcome::SignedIn(std::sync::Arc::new(token.into_session(now))));
    }
    let user_value = value.get("user").cloned().unwrap_or(value);
    let user: AuthUser = serde_json::from_value(user_value).map_err(|e| AuthError::Parse(e.to_string()))?;
    Ok(SignUpOutcome::ConfirmationRequired { user })
}

/// Pull a human-readable message out of an auth error body.
pub(crate) fn parse_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .map_or_else(|| body.trim().to_string(), str::to_string)
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
