//! Error types for the scraper

use thiserror::Error;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single page could not be retrieved.
///
/// Carries the URL that failed so callers can report it without threading
/// the request context through separately.
#[derive(Debug, Error)]
#[error("failed to fetch {url}: {kind}")]
pub struct FetchError {
    /// URL of the failing request
    pub url: String,

    /// What went wrong
    pub kind: FetchErrorKind,
}

/// Cause of a [`FetchError`]
#[derive(Debug, Error)]
pub enum FetchErrorKind {
    /// Connection, DNS, TLS, redirect or timeout failure
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("unexpected status {0}")]
    Status(u16),

    /// The response body could not be read
    #[error("failed to read body: {0}")]
    Body(#[source] reqwest::Error),
}

impl FetchError {
    pub(crate) fn new(url: impl Into<String>, kind: FetchErrorKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// HTTP status of the response, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            FetchErrorKind::Status(code) => Some(*code),
            FetchErrorKind::Transport(e) | FetchErrorKind::Body(e) => {
                e.status().map(|s| s.as_u16())
            }
        }
    }

    /// Whether the request ran out of time
    pub fn is_timeout(&self) -> bool {
        match &self.kind {
            FetchErrorKind::Transport(e) | FetchErrorKind::Body(e) => e.is_timeout(),
            FetchErrorKind::Status(_) => false,
        }
    }
}

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Page retrieval failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The caller passed something unusable (bad URL, `max_pages < 1`, bad selector)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Index/storage failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Malformed search query
    #[error("query error: {0}")]
    Query(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tantivy::TantivyError> for Error {
    fn from(err: tantivy::TantivyError) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<tantivy::query::QueryParserError> for Error {
    fn from(err: tantivy::query::QueryParserError) -> Self {
        Error::Query(err.to_string())
    }
}
