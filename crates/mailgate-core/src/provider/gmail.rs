//! Gmail REST API client.
//!
//! Authentication is user consent through the browser, after which the
//! refresh token keeps the session alive. Endpoints used:
//! - `users.messages.send` for sending
//! - `users.messages.modify` for removing the `SPAM` label

use async_trait::async_trait;
use mailgate_oauth::{
    InteractiveConsent, OAuthClient, Provider, RefreshTokenGrant, Token, TokenProvider,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    MailProvider, ProviderKind, SendReceipt, check_delivery, check_response, endpoint,
    require_message_id,
};
use crate::config::{GMAIL_API_BASE, GoogleClientSecrets, GoogleConfig};
use crate::error::{Error, Result};
use crate::message::Message;

const SPAM_LABEL: &str = "SPAM";

/// `users.messages.send` request body.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    raw: &'a str,
}

/// `users.messages.send` response (a message resource).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    id: String,
    #[allow(dead_code)]
    thread_id: Option<String>,
}

/// `users.messages.modify` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    remove_label_ids: [&'a str; 1],
}

/// Gmail API client.
#[derive(Debug)]
pub struct GmailClient {
    http: reqwest::Client,
    api_base: String,
    refresh: RefreshTokenGrant,
    consent: Box<dyn TokenProvider>,
    token: Option<Token>,
}

impl GmailClient {
    /// Creates a client that obtains tokens through browser consent.
    #[must_use]
    pub fn new(oauth: OAuthClient) -> Self {
        let refresh = RefreshTokenGrant::new(oauth.clone());
        Self {
            http: reqwest::Client::new(),
            api_base: GMAIL_API_BASE.to_string(),
            refresh,
            consent: Box::new(InteractiveConsent::new(oauth)),
            token: None,
        }
    }

    /// Builds a client from settings, reading the credentials file.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file is missing or invalid.
    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        let secrets = GoogleClientSecrets::from_file(&config.credentials_file)?;

        let mut provider = Provider::google()?;
        if let Some(uri) = &secrets.auth_uri {
            provider = provider.with_auth_url(uri)?;
        }
        if let Some(uri) = &secrets.token_uri {
            provider = provider.with_token_url(uri)?;
        }

        let mut oauth = OAuthClient::new(secrets.client_id, provider);
        if let Some(secret) = secrets.client_secret {
            oauth = oauth.with_client_secret(secret);
        }

        let consent = InteractiveConsent::new(oauth.clone())
            .with_port(config.callback_port)
            .with_timeout(config.consent_timeout());

        Ok(Self::new(oauth)
            .with_api_base(config.api_base.clone())
            .with_consent(Box::new(consent)))
    }

    /// Overrides the API host.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Replaces the grant used when no refreshable token is held.
    #[must_use]
    pub fn with_consent(mut self, consent: Box<dyn TokenProvider>) -> Self {
        self.consent = consent;
        self
    }

    /// Seeds a token obtained elsewhere (e.g. restored by the caller).
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    /// Token currently held.
    #[must_use]
    pub const fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    fn access_token(&self) -> Result<&str> {
        self.token
            .as_ref()
            .map(|t| t.access_token.as_str())
            .ok_or_else(|| Error::Auth("not authenticated".into()))
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn is_authenticated(&self) -> bool {
        self.token.as_ref().is_some_and(Token::is_valid)
    }

    async fn authenticate(&mut self) -> Result<()> {
        let token = match &self.token {
            Some(token) if token.is_valid() => return Ok(()),
            Some(token) if token.can_refresh() => {
                debug!("Gmail token expired, refreshing");
                self.refresh.fetch_token(Some(token)).await?
            }
            current => {
                info!(grant = %self.consent.grant(), "Gmail requires authorization");
                self.consent.fetch_token(current.as_ref()).await?
            }
        };

        self.token = Some(token);
        info!("Gmail authenticated");
        Ok(())
    }

    async fn send_email(&mut self, message: &Message) -> Result<SendReceipt> {
        message.validate()?;
        self.authenticate().await?;

        let url = endpoint(&self.api_base, &["gmail", "v1", "users", "me", "messages", "send"])?;
        let raw = message.to_gmail_raw();
        debug!(%url, "sending via Gmail");

        let response = self
            .http
            .post(url)
            .bearer_auth(self.access_token()?)
            .json(&SendRequest { raw: &raw })
            .send()
            .await?;
        let sent: SendResponse = check_delivery(response).await?.json().await?;

        info!(message_id = %sent.id, "Gmail accepted message");
        Ok(SendReceipt {
            provider: ProviderKind::Google,
            message_id: Some(sent.id),
        })
    }

    async fn move_out_of_spam(&mut self, message_id: &str) -> Result<()> {
        let id = require_message_id(message_id)?;
        self.authenticate().await?;

        let url = endpoint(
            &self.api_base,
            &["gmail", "v1", "users", "me", "messages", id, "modify"],
        )?;
        debug!(%url, "removing SPAM label");

        let response = self
            .http
            .post(url)
            .bearer_auth(self.access_token()?)
            .json(&ModifyRequest {
                remove_label_ids: [SPAM_LABEL],
            })
            .send()
            .await?;
        check_response(response, id).await?;

        info!(message_id = %id, "Gmail message moved out of spam");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use mailgate_oauth::GrantKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Consent stand-in that hands out a fixed token and counts calls.
    #[derive(Debug, Default)]
    struct ApprovedConsent {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TokenProvider for ApprovedConsent {
        fn grant(&self) -> GrantKind {
            GrantKind::InteractiveConsent
        }

        async fn fetch_token(&self, _current: Option<&Token>) -> mailgate_oauth::Result<Token> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Token::new("consented", "Bearer").with_refresh_token("r1"))
        }
    }

    #[derive(Debug)]
    struct DeniedConsent;

    #[async_trait]
    impl TokenProvider for DeniedConsent {
        fn grant(&self) -> GrantKind {
            GrantKind::InteractiveConsent
        }

        async fn fetch_token(&self, _current: Option<&Token>) -> mailgate_oauth::Result<Token> {
            Err(mailgate_oauth::Error::AccessDenied)
        }
    }

    fn client_for(server: &MockServer) -> GmailClient {
        let provider = Provider::google()
            .unwrap()
            .with_token_url(format!("{}/token", server.uri()))
            .unwrap();
        GmailClient::new(OAuthClient::new("cid", provider).with_client_secret("cs"))
            .with_api_base(server.uri())
    }

    fn valid_token() -> Token {
        Token::new("live-token", "Bearer").with_expires_at(Utc::now() + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_consent_when_no_token() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let mut client = client_for(&server).with_consent(Box::new(ApprovedConsent {
            calls: Arc::clone(&calls),
        }));

        assert!(!client.is_authenticated());
        client.authenticate().await.unwrap();
        assert!(client.is_authenticated());
        assert_eq!(client.token().unwrap().access_token, "consented");

        // A valid token is reused.
        client.authenticate().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_silently() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=r-old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "refreshed",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let expired = Token::new("old", "Bearer")
            .with_refresh_token("r-old")
            .with_expires_at(Utc::now() - Duration::minutes(5));
        let mut client = client_for(&server)
            .with_consent(Box::new(DeniedConsent))
            .with_token(expired);

        client.authenticate().await.unwrap();
        let token = client.token().unwrap();
        assert_eq!(token.access_token, "refreshed");
        assert_eq!(token.refresh_token.as_deref(), Some("r-old"));
    }

    #[tokio::test]
    async fn test_denied_consent_is_auth_error() {
        let server = MockServer::start().await;
        let mut client = client_for(&server).with_consent(Box::new(DeniedConsent));
        let err = client.authenticate().await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_send_posts_raw_mime() {
        let server = MockServer::start().await;
        let message = Message::new("recipient@example.com", "Hello from Gmail", "This is a test email.");
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .and(header("authorization", "Bearer live-token"))
            .and(body_json(serde_json::json!({ "raw": message.to_gmail_raw() })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "18c2f0a1b2",
                "threadId": "18c2f0a1b2",
                "labelIds": ["SENT"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server).with_token(valid_token());
        let receipt = client.send_email(&message).await.unwrap();
        assert_eq!(receipt.provider, ProviderKind::Google);
        assert_eq!(receipt.message_id.as_deref(), Some("18c2f0a1b2"));
    }

    #[tokio::test]
    async fn test_send_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid To header"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server).with_token(valid_token());
        let err = client
            .send_email(&Message::new("bad", "s", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Delivery { status: 400, ref body } if body == "Invalid To header"));
    }

    #[tokio::test]
    async fn test_send_forbidden_or_not_found_is_delivery_failure() {
        for (status, body) in [(403, "Insufficient Permission"), (404, "Not Found")] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/gmail/v1/users/me/messages/send"))
                .respond_with(ResponseTemplate::new(status).set_body_string(body))
                .expect(1)
                .mount(&server)
                .await;

            let mut client = client_for(&server).with_token(valid_token());
            let err = client
                .send_email(&Message::new("recipient@example.com", "s", "b"))
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::Delivery { status: s, body: ref b } if s == status && b == body),
                "{status}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_message_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut client = client_for(&server).with_token(valid_token());
        let err = client
            .send_email(&Message::new("", "s", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn test_move_out_of_spam_removes_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/abc123/modify"))
            .and(body_json(serde_json::json!({ "removeLabelIds": ["SPAM"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "abc123",
                "labelIds": ["INBOX"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server).with_token(valid_token());
        client.move_out_of_spam("abc123").await.unwrap();
    }

    #[tokio::test]
    async fn test_move_out_of_spam_errors_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/missing/modify"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Requested entity was not found."))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/revoked/modify"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
            .mount(&server)
            .await;

        let mut client = client_for(&server).with_token(valid_token());
        assert!(matches!(
            client.move_out_of_spam("missing").await,
            Err(Error::NotFound(ref id)) if id == "missing"
        ));
        assert!(client.move_out_of_spam("revoked").await.unwrap_err().is_auth());
    }
}
