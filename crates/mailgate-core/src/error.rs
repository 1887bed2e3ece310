//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential or token failure.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The provider rejected a send or modify request.
    #[error("Delivery failed ({status}): {body}")]
    Delivery {
        /// HTTP status returned by the provider.
        status: u16,
        /// Response body returned by the provider.
        body: String,
    },

    /// The referenced message does not exist.
    #[error("Message not found: {0}")]
    NotFound(String),

    /// No client is registered for the requested provider.
    #[error("Invalid email provider: {0}")]
    InvalidProvider(String),

    /// The message cannot be built as given.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The request never produced an HTTP status.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration file parse error.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<mailgate_oauth::Error> for Error {
    fn from(err: mailgate_oauth::Error) -> Self {
        Self::Auth(err.to_string())
    }
}

impl Error {
    /// Maps a failed operation on an existing message onto the error taxonomy.
    ///
    /// Sends never come through here; every failed send is
    /// [`Error::Delivery`].
    #[must_use]
    pub fn from_status(status: u16, body: String, message_id: &str) -> Self {
        match status {
            401 | 403 => Self::Auth(format!("provider returned {status}: {body}")),
            404 => Self::NotFound(message_id.to_string()),
            _ => Self::Delivery { status, body },
        }
    }

    /// Whether this is an authentication failure.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(Error::from_status(401, String::new(), "id").is_auth());
        assert!(Error::from_status(403, String::new(), "id").is_auth());
        assert!(matches!(
            Error::from_status(404, String::new(), "abc"),
            Error::NotFound(ref id) if id == "abc"
        ));
        assert!(matches!(
            Error::from_status(500, "boom".into(), "id"),
            Error::Delivery { status: 500, ref body } if body == "boom"
        ));
    }

    #[test]
    fn test_oauth_errors_become_auth() {
        let err: Error = mailgate_oauth::Error::NoRefreshToken.into();
        assert!(err.is_auth());
    }
}
