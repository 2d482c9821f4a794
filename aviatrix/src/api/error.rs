use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("rest API {action} failed: {reason}")]
    Rest { action: String, reason: String },

    #[error("failed to parse response for {action}: {message}")]
    ParseError { action: String, message: String },

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("object does not exist")]
    NotFound,

    #[error("async action {action} did not finish after {waited_secs} seconds")]
    AsyncTimeout { action: String, waited_secs: u64 },
}

impl ApiError {
    /// Controller responses signal a missing object through the reason text
    /// rather than an HTTP status.
    pub fn from_rest(action: &str, reason: String) -> Self {
        if reason.contains("does not exist") {
            ApiError::NotFound
        } else {
            ApiError::Rest {
                action: action.to_string(),
                reason,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}
