//! Microsoft Graph client (app-only).

use async_trait::async_trait;
use mailgate_oauth::{ClientCredentialGrant, OAuthClient, Provider, Token, TokenProvider};
use serde::Serialize;
use tracing::{debug, info};

use super::{
    MailProvider, ProviderKind, SendReceipt, check_delivery, check_response, endpoint,
    require_message_id,
};
use crate::config::{GRAPH_API_BASE, MicrosoftConfig};
use crate::error::{Error, Result};
use crate::message::Message;

/// Well-known folder name messages are moved to.
const INBOX_FOLDER: &str = "inbox";

#[derive(Debug, Serialize)]
struct SendMailRequest<'a> {
    message: GraphMessage<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage<'a> {
    subject: &'a str,
    body: ItemBody<'a>,
    to_recipients: Vec<Recipient<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient<'a> {
    email_address: EmailAddress<'a>,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    address: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveRequest<'a> {
    destination_id: &'a str,
}

impl<'a> From<&'a Message> for SendMailRequest<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            message: GraphMessage {
                subject: &message.subject,
                body: ItemBody {
                    content_type: "Text",
                    content: &message.body,
                },
                to_recipients: vec![Recipient {
                    email_address: EmailAddress {
                        address: message.to.trim(),
                    },
                }],
            },
        }
    }
}

/// Microsoft Graph client using the client-credentials grant.
#[derive(Debug)]
pub struct GraphClient {
    http: reqwest::Client,
    graph_base: String,
    mailbox: Option<String>,
    grant: Box<dyn TokenProvider>,
    token: Option<Token>,
}

impl GraphClient {
    /// Creates a client around a token grant.
    #[must_use]
    pub fn new(grant: Box<dyn TokenProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            graph_base: GRAPH_API_BASE.to_string(),
            mailbox: None,
            grant,
            token: None,
        }
    }

    /// Builds a client from settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `client_id`, `client_secret` or
    /// `tenant_id` is blank, or if the authority host is not a valid URL. No
    /// request is made here, so a secret that is present but wrong only fails
    /// later, as [`Error::Auth`] from [`MailProvider::authenticate`].
    pub fn from_config(config: &MicrosoftConfig) -> Result<Self> {
        config.validate()?;

        let provider = Provider::microsoft_with_authority(&config.authority_host, &config.tenant_id)
            .map_err(|e| Error::Config(format!("microsoft authority: {e}")))?;
        let oauth = OAuthClient::new(config.client_id.clone(), provider)
            .with_client_secret(config.client_secret());

        let mut client = Self::new(Box::new(ClientCredentialGrant::new(oauth)))
            .with_graph_base(config.graph_base.clone());
        client.mailbox.clone_from(&config.mailbox);
        Ok(client)
    }

    /// Overrides the Graph base URL.
    #[must_use]
    pub fn with_graph_base(mut self, graph_base: impl Into<String>) -> Self {
        self.graph_base = graph_base.into();
        self
    }

    /// Acts on `/users/{mailbox}` instead of `/me`.
    #[must_use]
    pub fn with_mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = Some(mailbox.into());
        self
    }

    /// Token currently held.
    #[must_use]
    pub const fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    fn mailbox_url(&self, tail: &[&str]) -> Result<reqwest::Url> {
        let mut segments: Vec<&str> = match &self.mailbox {
            Some(mailbox) => vec!["users", mailbox.as_str()],
            None => vec!["me"],
        };
        segments.extend_from_slice(tail);
        endpoint(&self.graph_base, &segments)
    }

    fn access_token(&self) -> Result<&str> {
        self.token
            .as_ref()
            .map(|t| t.access_token.as_str())
            .ok_or_else(|| Error::Auth("not authenticated".into()))
    }
}

#[async_trait]
impl MailProvider for GraphClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Microsoft
    }

    fn is_authenticated(&self) -> bool {
        self.token.as_ref().is_some_and(Token::is_valid)
    }

    async fn authenticate(&mut self) -> Result<()> {
        if self.is_authenticated() {
            return Ok(());
        }

        debug!(grant = %self.grant.grant(), "requesting Graph token");
        let token = self.grant.fetch_token(self.token.as_ref()).await?;
        self.token = Some(token);
        info!("Microsoft Graph authenticated");
        Ok(())
    }

    async fn send_email(&mut self, message: &Message) -> Result<SendReceipt> {
        message.validate()?;
        self.authenticate().await?;

        let url = self.mailbox_url(&["sendMail"])?;
        debug!(%url, "sending via Graph");

        let response = self
            .http
            .post(url)
            .bearer_auth(self.access_token()?)
            .json(&SendMailRequest::from(message))
            .send()
            .await?;
        check_delivery(response).await?;

        // sendMail answers 202 with no body, so there is no id to report.
        info!("Graph accepted message");
        Ok(SendReceipt {
            provider: ProviderKind::Microsoft,
            message_id: None,
        })
    }

    async fn move_out_of_spam(&mut self, message_id: &str) -> Result<()> {
        let id = require_message_id(message_id)?;
        self.authenticate().await?;

        let url = self.mailbox_url(&["messages", id, "move"])?;
        debug!(%url, "moving message to inbox");

        let response = self
            .http
            .post(url)
            .bearer_auth(self.access_token()?)
            .json(&MoveRequest {
                destination_id: INBOX_FOLDER,
            })
            .send()
            .await?;
        check_response(response, id).await?;

        info!(message_id = %id, "Graph message moved to inbox");
        Ok(())
    }
}
