//! Errors produced by the data layer.

/// Errors from REST, storage and the registration API built on them.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The operation needs the caller's identity and no session is held.
    #[error("not signed in")]
    NotAuthenticated,

    /// The HTTP request failed before a response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("backend error (status {status}): {message}")]
    Response { status: u16, message: String },

    /// The response body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// An update matched no rows the caller may change.
    #[error("{0}")]
    NotPermitted(&'static str),

    /// Submitted input failed client-side validation.
    #[error("invalid input: {}", .0.join(" "))]
    Invalid(Vec<&'static str>),

    /// A local file could not be read for upload.
    #[error("file read failed: {0}")]
    File(String),
}

impl ApiError {
    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }

    /// Stable machine-readable code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "E_NOT_AUTHENTICATED",
            Self::Request(_) => "E_REQUEST",
            Self::Response { .. } => "E_RESPONSE",
            Self::Parse(_) => "E_PARSE",
            Self::NotPermitted(_) => "E_NOT_PERMITTED",
            Self::Invalid(_) => "E_INVALID",
            Self::File(_) => "E_FILE",
        }
    }
}

/// Pull a human-readable message out of a REST or storage error body.
pub(crate) fn parse_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    ["message", "error_description", "error", "msg"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .map_or_else(|| body.trim().to_string(), str::to_string)
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
