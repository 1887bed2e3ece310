//! Token endpoint client and the interactive consent pieces.

mod code;
mod loopback;
mod pkce;

pub use code::AuthorizationCodeFlow;
pub use loopback::{CallbackParams, LoopbackListener};
pub use pkce::PkceChallenge;
pub(crate) use pkce::random_token;

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{self, GrantedToken, Token};
use reqwest::Client;
use tracing::debug;

/// Form body for one token endpoint request.
enum Grant<'a> {
    AuthorizationCode {
        code: &'a str,
        redirect_uri: &'a str,
        verifier: &'a str,
    },
    RefreshToken(&'a str),
    ClientCredentials(String),
}

impl Grant<'_> {
    const fn kind(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken(_) => "refresh_token",
            Self::ClientCredentials(_) => "client_credentials",
        }
    }

    fn fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![("grant_type", self.kind())];
        match self {
            Self::AuthorizationCode {
                code,
                redirect_uri,
                verifier,
            } => {
                fields.push(("code", *code));
                fields.push(("redirect_uri", *redirect_uri));
                fields.push(("code_verifier", *verifier));
            }
            Self::RefreshToken(refresh_token) => fields.push(("refresh_token", *refresh_token)),
            Self::ClientCredentials(scope) if !scope.is_empty() => fields.push(("scope", scope.as_str())),
            Self::ClientCredentials(_) => {}
        }
        fields
    }
}

/// Registered application plus the endpoints it talks to.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Application (client) id.
    pub client_id: String,
    /// Client secret; public desktop clients may have none.
    pub client_secret: Option<String>,
    /// Endpoints and defaults.
    pub provider: Provider,
    http: Client,
}

impl OAuthClient {
    /// Public client for `provider`.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            provider,
            http: Client::new(),
        }
    }

    /// Confidential client.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Shares an existing HTTP connection pool.
    #[must_use]
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Renews `token` silently.
    ///
    /// The old refresh credential is carried over when the server does not
    /// rotate it.
    ///
    /// # Errors
    ///
    /// [`Error::NoRefreshToken`](crate::Error::NoRefreshToken) without a
    /// request when `token` has no refresh credential, otherwise the
    /// endpoint's rejection.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let mut renewed = self
            .post(&Grant::RefreshToken(token.refresh_token()?))
            .await?;
        if renewed.refresh_token.is_none() {
            renewed.refresh_token.clone_from(&token.refresh_token);
        }
        Ok(renewed)
    }

    /// App-only token for `scopes`, or the provider defaults when `None`.
    ///
    /// # Errors
    ///
    /// Returns the endpoint's rejection, e.g. `invalid_client` for a bad secret.
    pub async fn client_credentials(&self, scopes: Option<&[String]>) -> Result<Token> {
        let scope = scopes.unwrap_or(&self.provider.default_scopes).join(" ");
        self.post(&Grant::ClientCredentials(scope)).await
    }

    pub(crate) async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        verifier: &str,
    ) -> Result<Token> {
        self.post(&Grant::AuthorizationCode {
            code,
            redirect_uri,
            verifier,
        })
        .await
    }

    async fn post(&self, grant: &Grant<'_>) -> Result<Token> {
        debug!(provider = %self.provider.name, grant = grant.kind(), "token request");

        let mut form = grant.fields();
        form.push(("client_id", self.client_id.as_str()));
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(self.provider.token_url.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(token::rejection(status.as_u16(), &body));
        }
        Token::try_from(response.json::<GrantedToken>().await?)
    }
}
