//! Pluggable token acquisition.
//!
//! A [`TokenProvider`] turns configuration (and optionally the token currently
//! held) into a fresh [`Token`]. Provider clients pick their grants at
//! construction time:
//!
//! - [`InteractiveConsent`]: browser consent with a loopback redirect
//! - [`RefreshTokenGrant`]: silent renewal from a refresh credential
//! - [`ClientCredentialGrant`]: app-only, non-interactive

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::flow::{AuthorizationCodeFlow, LoopbackListener, OAuthClient};
use crate::token::Token;

/// Default time to wait for the user to finish consent.
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Kind of grant a [`TokenProvider`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantKind {
    /// Authorization code obtained through user consent.
    InteractiveConsent,
    /// Refresh-token exchange.
    RefreshToken,
    /// Client-credentials (app-only) grant.
    ClientCredential,
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InteractiveConsent => write!(f, "interactive-consent"),
            Self::RefreshToken => write!(f, "refresh-token"),
            Self::ClientCredential => write!(f, "client-credential"),
        }
    }
}

/// Capability to obtain an access token.
#[async_trait]
pub trait TokenProvider: Send + Sync + fmt::Debug {
    /// Grant performed by this provider.
    fn grant(&self) -> GrantKind;

    /// Obtains a new token. `current` is the token held by the caller, if any.
    async fn fetch_token(&self, current: Option<&Token>) -> Result<Token>;
}

/// Opens the consent URL for the user.
pub type BrowserLauncher = Arc<dyn Fn(&Url) -> std::io::Result<()> + Send + Sync>;

/// Authorization-code grant with PKCE, completed through a loopback redirect.
pub struct InteractiveConsent {
    client: OAuthClient,
    scopes: Vec<String>,
    port: u16,
    timeout: Duration,
    launcher: BrowserLauncher,
}

impl fmt::Debug for InteractiveConsent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractiveConsent")
            .field("client_id", &self.client.client_id)
            .field("provider", &self.client.provider.name)
            .field("scopes", &self.scopes)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl InteractiveConsent {
    /// Creates a consent grant using the provider's default scopes, an
    /// ephemeral callback port and the system browser.
    #[must_use]
    pub fn new(client: OAuthClient) -> Self {
        let scopes = client.provider.default_scopes.clone();
        Self {
            client,
            scopes,
            port: 0,
            timeout: DEFAULT_CONSENT_TIMEOUT,
            launcher: Arc::new(|url: &Url| opener::open(url.as_str()).map_err(std::io::Error::other)),
        }
    }

    /// Sets the callback port (0 picks a free one).
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets how long to wait for the callback.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the browser launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: BrowserLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    /// Overrides the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

#[async_trait]
impl TokenProvider for InteractiveConsent {
    fn grant(&self) -> GrantKind {
        GrantKind::InteractiveConsent
    }

    async fn fetch_token(&self, _current: Option<&Token>) -> Result<Token> {
        let listener = LoopbackListener::bind(self.port).await?;
        let flow = AuthorizationCodeFlow::new(self.client.clone(), listener.redirect_uri())
            .with_scopes(self.scopes.clone());
        let url = flow.consent_url();

        info!(
            provider = %self.client.provider.name,
            "waiting for consent; if no browser opens, visit {url}"
        );
        if let Err(e) = (self.launcher)(&url) {
            warn!("could not open browser: {e}");
        }

        let callback = listener.wait_for_callback(self.timeout).await?;
        let token = flow.complete(callback).await?;
        info!(provider = %self.client.provider.name, "consent completed");
        Ok(token)
    }
}

/// Silent renewal from the refresh credential of the current token.
#[derive(Debug, Clone)]
pub struct RefreshTokenGrant {
    client: OAuthClient,
}

impl RefreshTokenGrant {
    /// Creates a refresh grant.
    #[must_use]
    pub const fn new(client: OAuthClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenGrant {
    fn grant(&self) -> GrantKind {
        GrantKind::RefreshToken
    }

    async fn fetch_token(&self, current: Option<&Token>) -> Result<Token> {
        let current = current.ok_or(Error::NoRefreshToken)?;
        self.client.refresh_token(current).await
    }
}

/// App-only client-credentials grant.
#[derive(Debug, Clone)]
pub struct ClientCredentialGrant {
    client: OAuthClient,
    scopes: Option<Vec<String>>,
}

impl ClientCredentialGrant {
    /// Creates a client-credentials grant using the provider's default scopes.
    #[must_use]
    pub const fn new(client: OAuthClient) -> Self {
        Self {
            client,
            scopes: None,
        }
    }

    /// Overrides the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = Some(scopes);
        self
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialGrant {
    fn grant(&self) -> GrantKind {
        GrantKind::ClientCredential
    }

    async fn fetch_token(&self, _current: Option<&Token>) -> Result<Token> {
        self.client.client_credentials(self.scopes.as_deref()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Launcher that plays the browser: follows the consent URL straight to the
    /// redirect with a fixed code.
    fn auto_approve(code: &'static str) -> BrowserLauncher {
        Arc::new(move |url: &Url| {
            let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
            let redirect = pairs["redirect_uri"].clone();
            let state = pairs["state"].clone();
            tokio::spawn(async move {
                let _ = reqwest::get(format!("{redirect}?code={code}&state={state}")).await;
            });
            Ok(())
        })
    }

    fn google_client(server: &MockServer) -> OAuthClient {
        let provider = Provider::new(
            "Google",
            format!("{}/o/oauth2/auth", server.uri()),
            format!("{}/token", server.uri()),
        )
        .unwrap()
        .with_default_scopes(vec!["https://www.googleapis.com/auth/gmail.send".into()]);
        OAuthClient::new("desktop-client", provider).with_client_secret("desktop-secret")
    }

    #[tokio::test]
    async fn test_interactive_consent_exchanges_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code-1"))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "user-token",
                "token_type": "Bearer",
                "expires_in": 3599,
                "refresh_token": "user-refresh"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let consent = InteractiveConsent::new(google_client(&server))
            .with_timeout(Duration::from_secs(10))
            .with_launcher(auto_approve("auth-code-1"));
        assert_eq!(consent.grant(), GrantKind::InteractiveConsent);

        let token = consent.fetch_token(None).await.unwrap();
        assert_eq!(token.access_token, "user-token");
        assert!(token.can_refresh());
    }

    #[tokio::test]
    async fn test_interactive_consent_times_out() {
        let server = MockServer::start().await;
        let consent = InteractiveConsent::new(google_client(&server))
            .with_timeout(Duration::from_millis(50))
            .with_launcher(Arc::new(|_: &Url| Ok(())));

        let err = consent.fetch_token(None).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_refresh_grant_needs_current_token() {
        let server = MockServer::start().await;
        let grant = RefreshTokenGrant::new(google_client(&server));
        assert_eq!(grant.grant(), GrantKind::RefreshToken);
        assert!(matches!(
            grant.fetch_token(None).await,
            Err(Error::NoRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_client_credential_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "app-token",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = Provider::microsoft_with_authority(&server.uri(), "tenant").unwrap();
        let grant =
            ClientCredentialGrant::new(OAuthClient::new("app", provider).with_client_secret("s"));
        assert_eq!(grant.grant().to_string(), "client-credential");
        let token = grant.fetch_token(None).await.unwrap();
        assert_eq!(token.access_token, "app-token");
    }
}
