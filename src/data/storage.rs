//! Object storage wrapper (`/storage/v1`).

use serde::Deserialize;

use super::error::{ApiError, parse_error_message};
use super::rest::parse_body;
use crate::config::BackendConfig;

pub struct StorageClient {
    http: reqwest::Client,
    base_url: String,
    storage_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl StorageClient {
    #[must_use]
    pub fn new(config: &BackendConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.url.clone(),
            storage_url: storage_endpoint(&config.url),
            anon_key: config.anon_key.clone(),
        }
    }

    /// Upload bytes to `bucket/path`. Existing objects are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns a response error (409 when the path is taken) or a request error.
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        bearer: &str,
    ) -> Result<(), ApiError> {
        let url = object_url(&self.storage_url, &["object", bucket], path)?;
        let request = self
            .authed(self.http.post(url), bearer)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send(request).await.map(|_| ())
    }

    /// Delete objects from a bucket.
    ///
    /// # Errors
    ///
    /// Returns a request or response error.
    pub async fn remove(&self, bucket: &str, paths: &[String], bearer: &str) -> Result<(), ApiError> {
        let url = object_url(&self.storage_url, &["object"], bucket)?;
        let request = self
            .authed(self.http.delete(url), bearer)
            .json(&serde_json::json!({ "prefixes": paths }));
        self.send(request).await.map(|_| ())
    }

    /// Time-limited download URL for a private object.
    ///
    /// # Errors
    ///
    /// Returns a request, response or parse error.
    pub async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
        bearer: &str,
    ) -> Result<String, ApiError> {
        let url = object_url(&self.storage_url, &["object", "sign", bucket], path)?;
        let request = self
            .authed(self.http.post(url), bearer)
            .json(&serde_json::json!({ "expiresIn": expires_in_secs }));
        let body = self.send(request).await?;
        let signed: SignedUrlResponse = parse_body(&body)?;
        Ok(absolute_signed_url(&self.base_url, &signed.signed_url))
    }

    /// URL of an object in a public bucket. No request is made.
    ///
    /// # Errors
    ///
    /// Returns a request error when the storage URL cannot carry a path.
    pub fn public_url(&self, bucket: &str, path: &str) -> Result<String, ApiError> {
        object_url(&self.storage_url, &["object", "public", bucket], path)
    }

    fn authed(&self, request: reqwest::RequestBuilder, bearer: &str) -> reqwest::RequestBuilder {
        request.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Response { status, message: parse_error_message(&text) });
        }
        Ok(text)
    }
}

fn storage_endpoint(base_url: &str) -> String {
    format!("{base_url}/storage/v1")
}

/// `{storage_url}/{prefix..}/{path}` with every path segment percent-encoded.
/// `/` in `path` separates segments.
fn object_url(storage_url: &str, prefix: &[&str], path: &str) -> Result<String, ApiError> {
    let mut url = reqwest::Url::parse(storage_url).map_err(|e| ApiError::Request(format!("invalid storage url: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ApiError::Request(format!("storage url cannot carry a path: {storage_url}")))?
        .pop_if_empty()
        .extend(prefix.iter().copied().chain(path.split('/')));
    Ok(url.into())
}

/// Signed URLs come back relative to the storage root.
fn absolute_signed_url(base_url: &str, signed: &str) -> String {
    if signed.starts_with("http://") || signed.starts_with("https://") {
        return signed.to_owned();
    }
    let relative = signed.trim_start_matches('/');
    let relative = relative.strip_prefix("storage/v1/").unwrap_or(relative);
    format!("{}/{relative}", storage_endpoint(base_url))
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
