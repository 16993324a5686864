use std::sync::Arc;

use uuid::Uuid;

use super::cache::key;
use super::rest::Query;
use super::types::{Event, EventWithClasses};
use super::{ApiError, RegistrationApi};

impl RegistrationApi {
    /// All visible events, soonest first.
    ///
    /// # Errors
    ///
    /// Returns a request, response or parse error.
    pub async fn events(&self) -> Result<Arc<Vec<Event>>, ApiError> {
        let bearer = self.bearer().await;
        self.cache
            .get_or_fetch(key(["events"]), || async {
                let query = Query::table("events").select("*").order("date_start", true);
                self.rest.select(&query, bearer.as_deref()).await
            })
            .await
    }

    /// One event with its classes.
    ///
    /// # Errors
    ///
    /// Returns a 406 response error when the event does not exist or is hidden.
    pub async fn event(&self, id: Uuid) -> Result<Arc<EventWithClasses>, ApiError> {
        let bearer = self.bearer().await;
        self.cache
            .get_or_fetch(key(["event".to_owned(), id.to_string()]), || async {
                let query = Query::table("events").select("*, classes (*)").eq("id", id);
                self.rest.select_single(&query, bearer.as_deref()).await
            })
            .await
    }
}
