//! Access tokens and token endpoint replies.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;

/// A token counts as expired this many seconds before its real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Access token held by a provider client.
///
/// Tokens live in memory only and are replaced wholesale on refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// Bearer credential.
    pub access_token: String,
    /// Token type reported by the server (almost always `Bearer`).
    pub token_type: String,
    /// Absolute expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Credential for silent renewal.
    pub refresh_token: Option<String>,
    /// Space-separated scopes actually granted.
    pub scope: Option<String>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl Token {
    /// Token with no expiry and no refresh credential.
    #[must_use]
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_at: None,
            refresh_token: None,
            scope: None,
        }
    }

    /// Sets the refresh credential.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the absolute expiry.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the token is expired or within the skew window of expiring.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at - Duration::seconds(EXPIRY_SKEW_SECS) <= Utc::now())
    }

    /// Opposite of [`Token::is_expired`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired()
    }

    /// Whether a refresh credential is present.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// The refresh credential.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRefreshToken`] when there is none.
    pub fn refresh_token(&self) -> Result<&str> {
        self.refresh_token.as_deref().ok_or(Error::NoRefreshToken)
    }
}

/// Successful token endpoint reply (RFC 6749 section 5.1).
#[derive(Debug, Deserialize)]
pub(crate) struct GrantedToken {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TryFrom<GrantedToken> for Token {
    type Error = Error;

    fn try_from(granted: GrantedToken) -> Result<Self> {
        if granted.access_token.is_empty() {
            return Err(Error::InvalidResponse("empty access_token".into()));
        }

        Ok(Self {
            access_token: granted.access_token,
            token_type: granted.token_type.unwrap_or_else(|| "Bearer".into()),
            expires_at: granted
                .expires_in
                .and_then(Duration::try_seconds)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl)),
            refresh_token: granted.refresh_token,
            scope: granted.scope,
        })
    }
}

/// Error reply from the token endpoint (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct RejectedGrant {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Maps a non-success token endpoint reply onto [`Error`].
///
/// Bodies that are not RFC 6749 error documents are kept verbatim under an
/// `http_<status>` code.
pub(crate) fn rejection(status: u16, body: &str) -> Error {
    match serde_json::from_str::<RejectedGrant>(body) {
        Ok(rejected) if rejected.error == "access_denied" => Error::AccessDenied,
        Ok(rejected) => {
            Error::oauth_error(rejected.error, rejected.error_description.unwrap_or_default())
        }
        Err(_) => Error::oauth_error(format!("http_{status}"), body.trim()),
    }
}
