use wstrack_common::ModelError;

/// Failure of a single fetch cycle.
///
/// # Examples
///
/// ```rust
/// use wstrack_fetcher::error::FetchError;
///
/// let err = FetchError::Upstream { status: 503, body: String::new() };
/// assert_eq!(err.kind(), "upstream");
/// assert_eq!(err.status(), Some(503));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response: connection refused, DNS
    /// failure, timeout, or the body could not be read.
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// The API answered with a non-success HTTP status.
    #[error("Upstream HTTP error: status={status}, body={body}")]
    Upstream { status: u16, body: String },

    /// The API answered 200 but the payload did not describe the item.
    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },
}

impl FetchError {
    /// Short label used as the `kind` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport { .. } => "transport",
            FetchError::Upstream { .. } => "upstream",
            FetchError::MalformedResponse { .. } => "malformed",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        FetchError::MalformedResponse {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        // the request URL carries the API key in its query string
        let e = e.without_url();
        // reqwest's Display hides the cause (e.g. "connection refused")
        let mut reason = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            reason.push_str(": ");
            reason.push_str(&cause.to_string());
            source = cause.source();
        }
        FetchError::Transport { reason }
    }
}

impl From<ModelError> for FetchError {
    fn from(e: ModelError) -> Self {
        FetchError::malformed(e.to_string())
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, FetchError>;
