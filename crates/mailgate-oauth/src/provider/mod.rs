//! Authorization server endpoints for the supported mail services.

use crate::error::{Error, Result};
use url::Url;

/// Gmail scopes: label changes (spam removal) and sending.
pub const GMAIL_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.send",
];

/// Graph app-only scope; grants whatever application permissions the tenant
/// admin consented to.
pub const GRAPH_SCOPES: &[&str] = &["https://graph.microsoft.com/.default"];

/// Public Microsoft identity platform host.
pub const MICROSOFT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Endpoints and request defaults of one authorization server.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Display name used in logs.
    pub name: String,
    /// Where the user is sent to grant consent.
    pub auth_url: Url,
    /// Where codes, refresh tokens and client credentials are redeemed.
    pub token_url: Url,
    /// Scopes requested when the caller names none.
    pub default_scopes: Vec<String>,
    /// Extra query pairs appended to every consent URL.
    pub consent_params: Vec<(String, String)>,
}

impl Provider {
    /// Provider with no default scopes or consent parameters.
    ///
    /// # Errors
    ///
    /// [`Error::Url`] if either endpoint does not parse.
    pub fn new(
        name: impl Into<String>,
        auth_url: impl AsRef<str>,
        token_url: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            auth_url: auth_url.as_ref().parse()?,
            token_url: token_url.as_ref().parse()?,
            default_scopes: Vec::new(),
            consent_params: Vec::new(),
        })
    }

    /// Replaces the scopes requested by default.
    #[must_use]
    pub fn with_default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Appends `key=value` to consent URLs.
    #[must_use]
    pub fn with_consent_param(mut self, key: &str, value: &str) -> Self {
        self.consent_params.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Overrides the consent endpoint, e.g. from a downloaded credentials file.
    ///
    /// # Errors
    ///
    /// [`Error::Url`] if `url` does not parse.
    pub fn with_auth_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.auth_url = url.as_ref().parse()?;
        Ok(self)
    }

    /// Overrides the token endpoint.
    ///
    /// # Errors
    ///
    /// [`Error::Url`] if `url` does not parse.
    pub fn with_token_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.token_url = url.as_ref().parse()?;
        Ok(self)
    }

    /// Google, asking for Gmail scopes and an offline (refreshable) grant.
    ///
    /// `prompt=consent` forces Google to issue a refresh token even when the
    /// user approved this client before.
    ///
    /// # Errors
    ///
    /// Only if the built-in endpoints fail to parse.
    pub fn google() -> Result<Self> {
        Ok(Self::new("Google", GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL)?
            .with_default_scopes(owned(GMAIL_SCOPES))
            .with_consent_param("access_type", "offline")
            .with_consent_param("prompt", "consent"))
    }

    /// Microsoft identity platform for a single tenant.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for a blank tenant.
    pub fn microsoft(tenant_id: &str) -> Result<Self> {
        Self::microsoft_with_authority(MICROSOFT_AUTHORITY_HOST, tenant_id)
    }

    /// Like [`Provider::microsoft`] against another authority host
    /// (sovereign clouds, test servers).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for a blank tenant, [`Error::Url`] for a bad host.
    pub fn microsoft_with_authority(host: &str, tenant_id: &str) -> Result<Self> {
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(Error::InvalidConfig("tenant_id is empty".into()));
        }

        let base = format!("{}/{tenant_id}/oauth2/v2.0", host.trim_end_matches('/'));
        Ok(
            Self::new("Microsoft", format!("{base}/authorize"), format!("{base}/token"))?
                .with_default_scopes(owned(GRAPH_SCOPES)),
        )
    }
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}
