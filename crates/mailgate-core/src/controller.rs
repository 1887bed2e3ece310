//! Dispatch of mail operations to the provider selected by the caller.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::{GmailClient, GraphClient, MailProvider, ProviderKind, SendReceipt};
use crate::reputation::{ReputationSource, ReputationTracker};

/// Front door for sending and spam recovery across providers.
///
/// Every registered client is authenticated before the controller is handed
/// out, so a constructed controller is ready to dispatch.
#[derive(Debug)]
pub struct EmailController {
    clients: HashMap<ProviderKind, Box<dyn MailProvider>>,
    reputation: ReputationTracker,
}

impl EmailController {
    /// Builds both provider clients from `config` and authenticates them.
    ///
    /// Gmail may open a browser for consent on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built or either authentication
    /// fails. There is no partially connected controller.
    ///
    /// A bad Microsoft secret surfaces in one of two ways: a blank
    /// `client_secret` is caught before any request as [`Error::Config`], while
    /// a secret the tenant rejects fails authentication as [`Error::Auth`].
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::builder()
            .client(Box::new(GmailClient::from_config(&config.google)?))
            .client(Box::new(GraphClient::from_config(&config.microsoft)?))
            .build()
            .await
    }

    /// Starts a controller with a custom set of clients.
    #[must_use]
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    /// Sends a plain-text message through `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProvider`] if no client is registered for
    /// `provider`, otherwise whatever the client fails with.
    pub async fn send_email(
        &mut self,
        to: &str,
        subject: &str,
        body: &str,
        provider: ProviderKind,
    ) -> Result<SendReceipt> {
        let message = Message::new(to, subject, body);
        let client = self.client_mut(provider)?;
        let receipt = client.send_email(&message).await?;
        info!(%provider, to = %message.to, "email sent");
        Ok(receipt)
    }

    /// Moves a message out of the spam folder of `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProvider`] if no client is registered for
    /// `provider`, otherwise whatever the client fails with.
    pub async fn move_email_out_of_spam(
        &mut self,
        email_id: &str,
        provider: ProviderKind,
    ) -> Result<()> {
        self.client_mut(provider)?
            .move_out_of_spam(email_id)
            .await?;
        info!(%provider, email_id, "email moved out of spam");
        Ok(())
    }

    /// Client registered for `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProvider`] if none is registered.
    pub fn client_mut(&mut self, provider: ProviderKind) -> Result<&mut dyn MailProvider> {
        match self.clients.get_mut(&provider) {
            Some(client) => Ok(client.as_mut()),
            None => {
                warn!(%provider, "no client registered");
                Err(Error::InvalidProvider(provider.to_string()))
            }
        }
    }

    /// Providers with a registered client.
    pub fn providers(&self) -> impl Iterator<Item = ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.clients.contains_key(kind))
    }

    /// Reputation tracker.
    #[must_use]
    pub const fn reputation(&self) -> &ReputationTracker {
        &self.reputation
    }

    /// Mutable reputation tracker, for [`ReputationTracker::monitor`].
    pub const fn reputation_mut(&mut self) -> &mut ReputationTracker {
        &mut self.reputation
    }
}

/// Builder for [`EmailController`].
#[derive(Debug, Default)]
pub struct ControllerBuilder {
    clients: HashMap<ProviderKind, Box<dyn MailProvider>>,
    reputation: Option<Box<dyn ReputationSource>>,
}

impl ControllerBuilder {
    /// Registers a client under its own [`MailProvider::kind`], replacing any
    /// earlier client of the same kind.
    #[must_use]
    pub fn client(mut self, client: Box<dyn MailProvider>) -> Self {
        self.clients.insert(client.kind(), client);
        self
    }

    /// Uses `source` for reputation checks instead of the static default.
    #[must_use]
    pub fn reputation_source(mut self, source: Box<dyn ReputationSource>) -> Self {
        self.reputation = Some(source);
        self
    }

    /// Authenticates every registered client and returns the controller.
    ///
    /// # Errors
    ///
    /// Returns the first authentication failure.
    pub async fn build(mut self) -> Result<EmailController> {
        for kind in ProviderKind::ALL {
            if let Some(client) = self.clients.get_mut(&kind) {
                client.authenticate().await?;
                info!(provider = %kind, "provider ready");
            }
        }

        let reputation = self
            .reputation
            .map_or_else(ReputationTracker::default, ReputationTracker::new);

        Ok(EmailController {
            clients: self.clients,
            reputation,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Client that records what it was asked to do.
    #[derive(Debug)]
    struct Recording {
        kind: ProviderKind,
        fail_auth: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn new(kind: ProviderKind, calls: &Arc<Mutex<Vec<String>>>) -> Box<Self> {
            Box::new(Self {
                kind,
                fail_auth: false,
                calls: Arc::clone(calls),
            })
        }
    }

    #[async_trait]
    impl MailProvider for Recording {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn is_authenticated(&self) -> bool {
            !self.fail_auth
        }

        async fn authenticate(&mut self) -> Result<()> {
            if self.fail_auth {
                return Err(Error::Auth("invalid_client".into()));
            }
            self.calls.lock().unwrap().push(format!("{}:auth", self.kind));
            Ok(())
        }

        async fn send_email(&mut self, message: &Message) -> Result<SendReceipt> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:send:{}", self.kind, message.to));
            Ok(SendReceipt {
                provider: self.kind,
                message_id: None,
            })
        }

        async fn move_out_of_spam(&mut self, message_id: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:move:{message_id}", self.kind));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_build_authenticates_and_dispatches_by_kind() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut controller = EmailController::builder()
            .client(Recording::new(ProviderKind::Microsoft, &calls))
            .client(Recording::new(ProviderKind::Google, &calls))
            .build()
            .await
            .unwrap();

        controller
            .send_email("a@example.com", "s", "b", ProviderKind::Microsoft)
            .await
            .unwrap();
        controller
            .move_email_out_of_spam("m1", ProviderKind::Google)
            .await
            .unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "gmail:auth",
                "microsoft:auth",
                "microsoft:send:a@example.com",
                "gmail:move:m1",
            ]
        );
        assert_eq!(
            controller.providers().collect::<Vec<_>>(),
            ProviderKind::ALL.to_vec()
        );
    }

    #[tokio::test]
    async fn test_unregistered_provider_is_rejected() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut controller = EmailController::builder()
            .client(Recording::new(ProviderKind::Google, &calls))
            .build()
            .await
            .unwrap();

        let err = controller
            .send_email("a@example.com", "s", "b", ProviderKind::Microsoft)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProvider(ref p) if p == "microsoft"));
        assert!(matches!(
            controller
                .move_email_out_of_spam("m1", ProviderKind::Microsoft)
                .await,
            Err(Error::InvalidProvider(_))
        ));
        assert_eq!(*calls.lock().unwrap(), vec!["gmail:auth"]);
    }

    #[tokio::test]
    async fn test_failed_authentication_aborts_build() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recording::new(ProviderKind::Microsoft, &calls);
        failing.fail_auth = true;

        let err = EmailController::builder()
            .client(Recording::new(ProviderKind::Google, &calls))
            .client(failing)
            .build()
            .await
            .unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_reputation_accessors() {
        let mut controller = EmailController::builder().build().await.unwrap();
        let ip = "203.0.113.5".parse().unwrap();
        controller.reputation_mut().monitor(ip).await.unwrap();
        assert!(controller.reputation().is_reputation_good(ip));
        assert_eq!(controller.providers().count(), 0);
    }
}
