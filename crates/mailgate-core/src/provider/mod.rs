//! Provider clients and the interface the controller dispatches through.
//!
//! - [`GmailClient`] - Gmail REST API, user consent + refresh token
//! - [`GraphClient`] - Microsoft Graph, app-only client credentials
//!
//! A new provider implements [`MailProvider`], gets a [`ProviderKind`] variant,
//! and is registered with the controller. Nothing else changes.

mod gmail;
mod graph;

pub use gmail::GmailClient;
pub use graph::GraphClient;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::{Response, Url};

use crate::error::{Error, Result};
use crate::message::Message;

/// Closed set of providers the controller can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    /// Gmail REST API.
    Google,
    /// Microsoft Graph.
    Microsoft,
}

impl ProviderKind {
    /// Every provider, in dispatch-table order.
    pub const ALL: [Self; 2] = [Self::Google, Self::Microsoft];

    /// Canonical selector string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "gmail",
            Self::Microsoft => "microsoft",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmail" | "google" => Ok(Self::Google),
            "microsoft" | "outlook" | "graph" => Ok(Self::Microsoft),
            _ => Err(Error::InvalidProvider(s.to_string())),
        }
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Provider that accepted the message.
    pub provider: ProviderKind,
    /// Provider-assigned id, when the API returns one.
    pub message_id: Option<String>,
}

/// Capability set shared by every provider client.
///
/// Methods take `&mut self`: a client holds one token and refreshes it in
/// place, so callers sharing a client across tasks must wrap it in a mutex.
#[async_trait]
pub trait MailProvider: Send + Sync + fmt::Debug {
    /// Which provider this client talks to.
    fn kind(&self) -> ProviderKind;

    /// Whether a currently valid token is held.
    fn is_authenticated(&self) -> bool;

    /// Obtains or refreshes the access token.
    async fn authenticate(&mut self) -> Result<()>;

    /// Sends a plain-text message from the authenticated mailbox.
    async fn send_email(&mut self, message: &Message) -> Result<SendReceipt>;

    /// Moves a message from the spam/junk folder back to the inbox.
    async fn move_out_of_spam(&mut self, message_id: &str) -> Result<()>;
}

/// Appends path segments (percent-encoded) to a base URL.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url =
        Url::parse(base).map_err(|e| Error::Config(format!("invalid API base {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("API base cannot have a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Passes a successful send through; any other status becomes
/// [`Error::Delivery`] carrying the provider's body.
pub(crate) async fn check_delivery(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Delivery {
        status: status.as_u16(),
        body,
    })
}

/// Passes a successful message operation through and maps failures by status
/// (see [`Error::from_status`]).
pub(crate) async fn check_response(response: Response, message_id: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::from_status(status.as_u16(), body, message_id))
}

pub(crate) fn require_message_id(message_id: &str) -> Result<&str> {
    let id = message_id.trim();
    if id.is_empty() {
        return Err(Error::InvalidMessage("empty message id".into()));
    }
    Ok(id)
}
