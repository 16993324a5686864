//! Session persistence between runs.
//!
//! The signed-in session is written as JSON so a restarted client resumes
//! without asking for credentials again. Tests use the in-memory variant.

use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{AuthError, Session};

#[async_trait::async_trait]
pub trait SessionPersistence: Send + Sync {
    /// Load the stored session, if any.
    async fn load(&self) -> Result<Option<Session>, AuthError>;
    /// Replace the stored session.
    async fn save(&self, session: &Session) -> Result<(), AuthError>;
    /// Forget the stored session. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<(), AuthError>;
}

// =============================================================================
// FILE
// =============================================================================

/// JSON file on local disk.
pub struct FileSessionPersistence {
    path: PathBuf,
}

impl FileSessionPersistence {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SessionPersistence for FileSessionPersistence {
    async fn load(&self) -> Result<Option<Session>, AuthError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Storage(e.to_string())),
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable session file");
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<(), AuthError> {
        let body = serde_json::to_vec_pretty(session).map_err(|e| AuthError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    async fn clear(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionPersistence {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self { slot: Mutex::new(Some(session)) }
    }

    /// Current stored value, for inspection.
    #[must_use]
    pub fn stored(&self) -> Option<Session> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl SessionPersistence for MemorySessionPersistence {
    async fn load(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.stored())
    }

    async fn save(&self, session: &Session) -> Result<(), AuthError> {
        *self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        *self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "persist_test.rs"]
mod tests;
