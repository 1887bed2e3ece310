//! Token acquisition errors.

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a token could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Token endpoint or callback refused the grant (RFC 6749 error code).
    #[error("token request rejected: {error}: {description}")]
    OAuth {
        /// Error code such as `invalid_client` or `invalid_grant`.
        error: String,
        /// Server-supplied detail, possibly empty.
        description: String,
    },

    /// The user declined consent.
    #[error("user denied authorization")]
    AccessDenied,

    /// Consent callback echoed a different `state` than was sent.
    #[error("authorization state mismatch")]
    StateMismatch,

    /// No consent callback arrived in time.
    #[error("no authorization callback within {0} seconds")]
    Timeout(u64),

    /// Refresh requested for a token without a refresh credential.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// Token endpoint or callback sent something unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Provider settings are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Endpoint URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Transport failure talking to the token endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON from the token endpoint.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Loopback listener failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds [`Error::OAuth`].
    #[must_use]
    pub fn oauth_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuth {
            error: error.into(),
            description: description.into(),
        }
    }
}
