// Error handling module
// Defines refresh and fetch error types

use thiserror::Error;

/// Reasons a credential refresh can fail.
///
/// `Clone` because a single outcome is handed to every caller waiting on the
/// same in-flight refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Refresh endpoint unreachable
    #[error("Refresh request failed: {0}")]
    Transport(String),

    /// Refresh endpoint answered outside the 2xx range
    #[error("Refresh request failed with status {0}")]
    Status(u16),

    /// Body was not the expected JSON object
    #[error("Refresh response could not be parsed: {0}")]
    MalformedBody(String),

    /// Body parsed but carried no usable accessToken
    #[error("Refresh response missing accessToken")]
    MissingToken,
}

impl RefreshError {
    /// Endpoint-level failure (unreachable or non-success status)
    pub fn is_transport(&self) -> bool {
        matches!(self, RefreshError::Transport(_) | RefreshError::Status(_))
    }
}

/// Errors surfaced to callers of the authenticated fetch pipeline
#[derive(Error, Debug)]
pub enum FetchError {
    /// The protected request itself failed at the transport level
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 401 could not be recovered because the refresh failed
    #[error("Authentication refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// The request could not be built (bad path, unparsable URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;
