//! Thin wrapper over the hosted REST data API (`/rest/v1`).
//!
//! `Query` builds the filter/order/select parameters as plain data so it can
//! be checked without a network; `RestClient` sends them.

use std::fmt::Display;
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::{ApiError, parse_error_message};
use crate::config::BackendConfig;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Table read/filter description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    table: String,
    params: Vec<(String, String)>,
}

impl Query {
    #[must_use]
    pub fn table(name: &str) -> Self {
        Self { table: name.to_owned(), params: Vec::new() }
    }

    /// Column list, embedded relations allowed: `*, classes (*)`.
    /// Whitespace is stripped so multi-line selects can be written readably.
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        let compact: String = columns.split_whitespace().collect();
        self.params.push(("select".to_owned(), compact));
        self
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_owned(), format!("eq.{value}")));
        self
    }

    #[must_use]
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params.push(("order".to_owned(), format!("{column}.{direction}")));
        self
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

pub struct RestClient {
    http: reqwest::Client,
    rest_url: String,
    anon_key: String,
}

impl RestClient {
    #[must_use]
    pub fn new(config: &BackendConfig, http: reqwest::Client) -> Self {
        Self { http, rest_url: rest_endpoint(&config.url), anon_key: config.anon_key.clone() }
    }

    /// Read every matching row.
    ///
    /// # Errors
    ///
    /// Returns a request, response or parse error.
    pub async fn select<T: DeserializeOwned>(&self, query: &Query, bearer: Option<&str>) -> Result<Vec<T>, ApiError> {
        let request = self.request(reqwest::Method::GET, query.table_name(), bearer).query(query.params());
        let body = self.send(query.table_name(), request).await?;
        parse_body(&body)
    }

    /// Read exactly one row; zero or several rows is a 406 from the backend.
    ///
    /// # Errors
    ///
    /// Returns a request, response or parse error.
    pub async fn select_single<T: DeserializeOwned>(&self, query: &Query, bearer: Option<&str>) -> Result<T, ApiError> {
        let request = self
            .request(reqwest::Method::GET, query.table_name(), bearer)
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .query(query.params());
        let body = self.send(query.table_name(), request).await?;
        parse_body(&body)
    }

    /// Insert one row and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns a request, response or parse error.
    pub async fn insert<T, B>(&self, table: &str, row: &B, bearer: Option<&str>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self
            .request(reqwest::Method::POST, table, bearer)
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(row);
        let body = self.send(table, request).await?;
        parse_body(&body)
    }

    /// Patch every row matching `query` and return the updated rows.
    /// Rows hidden by row-level security are silently skipped, so an empty
    /// result means nothing the caller may change matched.
    ///
    /// # Errors
    ///
    /// Returns a request, response or parse error.
    pub async fn update<T, B>(&self, query: &Query, patch: &B, bearer: Option<&str>) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self
            .request(reqwest::Method::PATCH, query.table_name(), bearer)
            .header("Prefer", RETURN_REPRESENTATION)
            .query(query.params())
            .json(patch);
        let body = self.send(query.table_name(), request).await?;
        parse_body(&body)
    }

    fn request(&self, method: reqwest::Method, table: &str, bearer: Option<&str>) -> reqwest::RequestBuilder {
        let url = format!("{}/{table}", self.rest_url);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn send(&self, table: &str, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        if !(200..300).contains(&status) {
            tracing::warn!(table, status, elapsed_ms, "rest request failed");
            return Err(ApiError::Response { status, message: parse_error_message(&text) });
        }
        tracing::debug!(table, status, elapsed_ms, "rest request");
        Ok(text)
    }
}

fn rest_endpoint(base_url: &str) -> String {
    format!("{base_url}/rest/v1")
}

pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod tests;
