//! One authorization-code attempt.

use super::{CallbackParams, OAuthClient, PkceChallenge, random_token};
use crate::error::Result;
use crate::token::Token;
use url::Url;

/// Length of the generated CSRF `state` value.
const STATE_LEN: usize = 16;

/// A single consent attempt: redirect target, CSRF state and PKCE pair are
/// fixed when the attempt starts and checked when it completes.
#[derive(Debug)]
pub struct AuthorizationCodeFlow {
    client: OAuthClient,
    redirect_uri: String,
    scopes: Vec<String>,
    state: String,
    pkce: PkceChallenge,
}

impl AuthorizationCodeFlow {
    /// Starts an attempt that will be redirected to `redirect_uri`, requesting
    /// the provider's default scopes.
    #[must_use]
    pub fn new(client: OAuthClient, redirect_uri: impl Into<String>) -> Self {
        let scopes = client.provider.default_scopes.clone();
        Self {
            client,
            redirect_uri: redirect_uri.into(),
            scopes,
            state: random_token(STATE_LEN),
            pkce: PkceChallenge::generate(),
        }
    }

    /// Requests `scopes` instead of the provider defaults.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// CSRF state the callback must echo.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// PKCE pair sent with this attempt.
    #[must_use]
    pub const fn pkce(&self) -> &PkceChallenge {
        &self.pkce
    }

    /// URL the user opens to grant consent.
    #[must_use]
    pub fn consent_url(&self) -> Url {
        let mut url = self.client.provider.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", &self.state)
            .append_pair("code_challenge", self.pkce.challenge())
            .append_pair("code_challenge_method", self.pkce.method())
            .extend_pairs(&self.client.provider.consent_params);
        url
    }

    /// Checks the callback against this attempt and trades its code for a token.
    ///
    /// # Errors
    ///
    /// Returns the callback's own error (denial, state mismatch, missing code)
    /// or the token endpoint's rejection.
    pub async fn complete(&self, callback: CallbackParams) -> Result<Token> {
        let code = callback.into_code(&self.state)?;
        self.client
            .exchange_code(&code, &self.redirect_uri, self.pkce.verifier())
            .await
    }
}
