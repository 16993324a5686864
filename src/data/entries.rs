use std::sync::Arc;

use uuid::Uuid;

use super::cache::key;
use super::rest::Query;
use super::types::{Entry, EntryStatus, EntryWithEvent, NewEntry, Profile};
use super::{ApiError, RegistrationApi};

/// Registration form as the user filled it in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistrationForm {
    pub event_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub driver_name: String,
    pub driver_email: String,
    pub kart_number: String,
}

impl RegistrationForm {
    /// Empty form for an event, prefilled with the driver's name and email.
    #[must_use]
    pub fn prefilled(event_id: Uuid, profile: Option<&Profile>) -> Self {
        Self {
            event_id: Some(event_id),
            driver_name: profile.map(Profile::display_name).unwrap_or_default(),
            driver_email: profile.and_then(|p| p.email.clone()).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Every problem with the form, in display order. Empty when valid.
    #[must_use]
    pub fn problems(&self) -> Vec<&'static str> {
        let mut problems = Vec::new();
        if self.class_id.is_none() {
            problems.push("Please select a class.");
        }
        if self.driver_name.is_empty() {
            problems.push("Driver name is required.");
        }
        if self.driver_email.is_empty() {
            problems.push("Driver email is required.");
        }
        problems
    }

    /// Turn a valid form into an insert payload for `profile`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Invalid` listing every problem.
    pub fn into_entry(self, profile: Uuid) -> Result<NewEntry, ApiError> {
        let problems = self.problems();
        if !problems.is_empty() {
            return Err(ApiError::Invalid(problems));
        }
        let (Some(event_id), Some(class_id)) = (self.event_id, self.class_id) else {
            return Err(ApiError::Invalid(vec!["Event not found."]));
        };
        Ok(NewEntry {
            event_id,
            class_id,
            profile,
            driver_name: self.driver_name,
            driver_email: self.driver_email,
            kart_number: Some(self.kart_number).filter(|k| !k.is_empty()),
            status: EntryStatus::Pending,
        })
    }
}

impl RegistrationApi {
    /// The caller's entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without a session, else a backend error.
    pub async fn my_entries(&self) -> Result<Arc<Vec<EntryWithEvent>>, ApiError> {
        let session = self.require_session().await?;
        let uid = session.user_id();
        self.cache
            .get_or_fetch(key(["my-entries".to_owned(), uid.to_string()]), || async {
                let query = Query::table("entries")
                    .select("*, events (*)")
                    .eq("profile", uid)
                    .order("created_at", false);
                self.rest.select(&query, Some(&session.access_token)).await
            })
            .await
    }

    /// Submit a registration. New entries always start as pending.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for an incomplete form, `NotAuthenticated` without a
    /// session, else a backend error.
    pub async fn register_for_event(&self, form: RegistrationForm) -> Result<Entry, ApiError> {
        let session = self.require_session().await?;
        let row = form.into_entry(session.user_id())?;
        let entry: Entry = self.rest.insert("entries", &row, Some(&session.access_token)).await?;
        tracing::info!(entry_id = %entry.id, event_id = %entry.event_id, "registered for event");
        self.cache.invalidate(&key(["my-entries"])).await;
        Ok(entry)
    }
}

#[cfg(test)]
#[path = "entries_test.rs"]
mod tests;
