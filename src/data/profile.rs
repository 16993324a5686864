use std::sync::Arc;

use super::cache::key;
use super::rest::Query;
use super::types::{Profile, ProfileUpdate};
use super::{ApiError, RegistrationApi};

pub(crate) const PROFILE_UPDATE_FAILED: &str = "Unable to update profile. Please try again.";

impl RegistrationApi {
    /// The caller's profile row.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without a session, else a backend error.
    pub async fn profile(&self) -> Result<Arc<Profile>, ApiError> {
        let session = self.require_session().await?;
        let uid = session.user_id();
        self.cache
            .get_or_fetch(key(["profile".to_owned(), uid.to_string()]), || async {
                let query = Query::table("profiles").select("*").eq("id", uid);
                self.rest.select_single(&query, Some(&session.access_token)).await
            })
            .await
    }

    /// Patch the caller's profile. An empty update is a no-op read.
    ///
    /// # Errors
    ///
    /// Returns `NotPermitted` when the backend matched no row.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Arc<Profile>, ApiError> {
        if update.is_empty() {
            return self.profile().await;
        }
        let session = self.require_session().await?;
        let uid = session.user_id();

        let query = Query::table("profiles").eq("id", uid).select("*");
        let rows: Vec<Profile> = self.rest.update(&query, &update, Some(&session.access_token)).await?;
        let Some(profile) = rows.into_iter().next() else {
            tracing::warn!(user_id = %uid, "profile update matched no rows");
            return Err(ApiError::NotPermitted(PROFILE_UPDATE_FAILED));
        };

        tracing::info!(user_id = %uid, "profile updated");
        let cache_key = key(["profile".to_owned(), uid.to_string()]);
        self.cache.invalidate(&cache_key).await;
        let profile = Arc::new(profile);
        self.cache.insert(cache_key, Arc::clone(&profile)).await;
        Ok(profile)
    }
}
