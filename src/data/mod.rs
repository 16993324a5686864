//! Registration data API: events, entries, teams, profile and documents.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every read and write goes to the hosted REST API or object storage with
//! the current session's access token. Row-level security on the backend
//! decides what the caller may see and change; this layer only shapes
//! requests, caches reads and maps empty writes to clear errors.
//!
//! DESIGN
//! ======
//! `RegistrationApi` has one method per screen query or mutation, split by
//! domain across the submodules. Reads go through `QueryCache` under a
//! stable key; writes invalidate the keys they make stale.
//!
//! Row-level security makes even id-keyed reads (`["team", id]`) depend on
//! who asks, so the whole cache is cleared whenever the signed-in user
//! changes.
//!
//! ERROR HANDLING
//! ==============
//! Operations that need the caller's identity fail fast with
//! `ApiError::NotAuthenticated` when the session store holds no session.

pub mod cache;
mod documents;
mod entries;
pub mod error;
mod events;
mod profile;
pub mod rest;
pub mod storage;
mod teams;
pub mod types;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use uuid::Uuid;

use crate::auth::Session;
use crate::config::BackendConfig;
use crate::session::SessionHandle;

pub use cache::{CacheKey, QueryCache};
pub use documents::{DOCUMENTS_BUCKET, DocumentStatus, MAX_UPLOAD_BYTES, SIGNED_URL_TTL_SECS, object_path};
pub use entries::RegistrationForm;
pub use error::ApiError;
pub use rest::{Query, RestClient};
pub use storage::StorageClient;

pub struct RegistrationApi {
    rest: RestClient,
    storage: StorageClient,
    cache: QueryCache,
    session: SessionHandle,
    /// User the cached rows were fetched for.
    cache_owner: Mutex<Option<Uuid>>,
}

impl RegistrationApi {
    #[must_use]
    pub fn new(config: &BackendConfig, http: reqwest::Client, session: SessionHandle) -> Self {
        Self {
            rest: RestClient::new(config, http.clone()),
            storage: StorageClient::new(config, http),
            cache: QueryCache::new(Duration::from_secs(config.query_stale_secs)),
            cache_owner: Mutex::new(session.user_id()),
            session,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Snapshot the session for one operation, dropping cached rows that
    /// belong to a different user.
    async fn caller(&self) -> Option<Arc<Session>> {
        let session = self.session.session();
        let current = session.as_ref().map(|s| s.user.id);
        let changed = {
            let mut owner = self.cache_owner.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = *owner != current;
            *owner = current;
            changed
        };
        if changed {
            self.cache.clear().await;
            tracing::debug!(user_id = ?current, "caller changed; query cache cleared");
        }
        session
    }

    /// Current session, or `NotAuthenticated`.
    async fn require_session(&self) -> Result<Arc<Session>, ApiError> {
        self.caller().await.ok_or(ApiError::NotAuthenticated)
    }

    /// Bearer for reads that also work signed out.
    async fn bearer(&self) -> Option<String> {
        self.caller().await.map(|s| s.access_token.clone())
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;
