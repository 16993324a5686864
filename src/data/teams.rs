use std::sync::Arc;

use uuid::Uuid;

use super::cache::key;
use super::rest::Query;
use super::types::{Membership, Team, TeamDetail, TeamUpdate};
use super::{ApiError, RegistrationApi};

pub(crate) const TEAM_UPDATE_DENIED: &str = "Unable to update team. You may not have permission.";
pub(crate) const TEAM_NAME_REQUIRED: &str = "Team name is required";

impl RegistrationApi {
    /// Teams the caller belongs to.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without a session, else a backend error.
    pub async fn my_teams(&self) -> Result<Arc<Vec<Membership>>, ApiError> {
        let session = self.require_session().await?;
        let uid = session.user_id();
        self.cache
            .get_or_fetch(key(["my-teams".to_owned(), uid.to_string()]), || async {
                let query = Query::table("team_members").select("*, teams (*)").eq("profile", uid);
                self.rest.select(&query, Some(&session.access_token)).await
            })
            .await
    }

    /// A team with its roster and each member's profile.
    ///
    /// # Errors
    ///
    /// Returns a 406 response error when the team does not exist or is hidden.
    pub async fn team(&self, id: Uuid) -> Result<Arc<TeamDetail>, ApiError> {
        let bearer = self.bearer().await;
        self.cache
            .get_or_fetch(key(["team".to_owned(), id.to_string()]), || async {
                let query = Query::table("teams")
                    .select(
                        "
                        *,
                        team_members (
                            *,
                            profiles (*)
                        )
                    ",
                    )
                    .eq("id", id);
                self.rest.select_single(&query, bearer.as_deref()).await
            })
            .await
    }

    /// Apply `update` to a team, stamping the caller as `updated_by`.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a blank name and `NotPermitted` when the backend
    /// matched no row the caller may change.
    pub async fn update_team(&self, id: Uuid, update: TeamUpdate) -> Result<Team, ApiError> {
        let session = self.require_session().await?;
        let update = normalize_team_update(update, session.user_id())?;

        let query = Query::table("teams").eq("id", id).select("*");
        let rows: Vec<Team> = self.rest.update(&query, &update, Some(&session.access_token)).await?;
        let Some(team) = rows.into_iter().next() else {
            tracing::warn!(team_id = %id, "team update matched no rows");
            return Err(ApiError::NotPermitted(TEAM_UPDATE_DENIED));
        };

        tracing::info!(team_id = %id, "team updated");
        self.cache.invalidate(&key(["team".to_owned(), id.to_string()])).await;
        self.cache.invalidate(&key(["my-teams"])).await;
        Ok(team)
    }
}

/// Trim the name, reject a blank one and stamp the editor.
pub(crate) fn normalize_team_update(mut update: TeamUpdate, editor: Uuid) -> Result<TeamUpdate, ApiError> {
    if let Some(name) = update.name.take() {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Invalid(vec![TEAM_NAME_REQUIRED]));
        }
        update.name = Some(name.to_owned());
    }
    update.logo = update.logo.map(|l| l.trim().to_owned());
    update.updated_by = Some(editor);
    Ok(update)
}

#[cfg(test)]
#[path = "teams_test.rs"]
mod tests;
