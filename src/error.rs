//! Error types for catalog access.

use thiserror::Error;

/// Errors surfaced by catalog operations.
///
/// Hydration gaps and curation failures never show up here: a movie that
/// fails to hydrate is dropped from its batch, and a failed rerank falls
/// back to the original order.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A required credential or setting is missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream answered with a non-2xx status after the retry budget.
    #[error("TMDB {status} {status_text} {body}")]
    Upstream {
        /// HTTP status code of the final attempt.
        status: u16,
        /// Reason phrase of the final attempt.
        status_text: String,
        /// Response body of the final attempt, possibly empty.
        body: String,
    },

    /// No complete response arrived (connect, reset, timeout, short body).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body was not the JSON shape we expected.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl CatalogError {
    /// Whether another attempt might succeed.
    ///
    /// Rate limiting (429), server errors (5xx) and network failures are
    /// transient; every other status is final.
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::Upstream { status, .. } => {
                *status == 429 || (500..=599).contains(status)
            }
            CatalogError::Transport(_) => true,
            CatalogError::Config(_) | CatalogError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        CatalogError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Decode(e.to_string())
    }
}

/// Convenience alias for results carrying a [`CatalogError`].
pub type Result<T> = std::result::Result<T, CatalogError>;
