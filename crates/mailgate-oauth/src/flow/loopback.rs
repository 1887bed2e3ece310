//! Loopback redirect receiver for the interactive consent flow.
//!
//! Binds `127.0.0.1` on the requested port (0 picks an ephemeral one) and
//! serves the redirect with axum until the first authorization callback
//! arrives. Connections are served concurrently, so a browser's speculative
//! pre-connection cannot hold up the real redirect.

use crate::error::{Error, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

const SUCCESS_PAGE: &str = "<html><body><h3>Authorization complete.</h3>\
<p>You can close this window and return to the application.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h3>Authorization failed.</h3>\
<p>Return to the application for details.</p></body></html>";

/// Query parameters delivered on the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// Echoed CSRF state.
    pub state: Option<String>,
    /// Error code when the user or server refused.
    pub error: Option<String>,
    /// Optional error description.
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Whether this request is an authorization callback at all.
    ///
    /// Browsers also fetch things like `/favicon.ico` from the same origin.
    #[must_use]
    pub const fn is_callback(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }

    /// Extracts the authorization code after checking state and errors.
    ///
    /// # Errors
    ///
    /// - [`Error::AccessDenied`] when the user refused consent
    /// - [`Error::OAuth`] for any other error reported on the callback
    /// - [`Error::StateMismatch`] when `state` differs from `expected_state`
    /// - [`Error::InvalidResponse`] when no code is present
    pub fn into_code(self, expected_state: &str) -> Result<String> {
        if let Some(error) = self.error {
            if error == "access_denied" {
                return Err(Error::AccessDenied);
            }
            return Err(Error::oauth_error(
                error,
                self.error_description.unwrap_or_default(),
            ));
        }

        if self.state.as_deref() != Some(expected_state) {
            return Err(Error::StateMismatch);
        }

        self.code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| Error::InvalidResponse("callback carried no code".into()))
    }
}

/// Hands the first callback to the waiting flow; later ones find it empty.
type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// One-shot HTTP receiver for the consent redirect.
#[derive(Debug)]
pub struct LoopbackListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl LoopbackListener {
    /// Binds the loopback interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await?;
        let addr = listener.local_addr()?;
        debug!(%addr, "consent callback listener bound");
        Ok(Self { listener, addr })
    }

    /// Port actually bound.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Redirect URI to register with the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}/", self.addr.ip(), self.addr.port())
    }

    /// Serves the redirect until a callback arrives, then shuts the server down.
    ///
    /// Requests that are not callbacks are answered with 404 and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no callback arrives within `timeout`, or
    /// [`Error::InvalidResponse`] if the server stops before one does.
    pub async fn wait_for_callback(self, timeout: Duration) -> Result<CallbackParams> {
        let (callback_tx, callback_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let slot: CallbackSlot = Arc::new(Mutex::new(Some(callback_tx)));
        let app = Router::new().fallback(receive_callback).with_state(slot);

        // Not awaited: graceful shutdown lets in-flight responses finish, and
        // an idle pre-connection must not keep the caller waiting.
        tokio::spawn(async move {
            let served = axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!("consent callback server failed: {e}");
            }
        });

        let outcome = tokio::time::timeout(timeout, callback_rx).await;
        let _ = stop_tx.send(());

        match outcome {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(Error::InvalidResponse(
                "callback server stopped before the redirect arrived".into(),
            )),
            Err(_) => Err(Error::Timeout(timeout.as_secs())),
        }
    }
}

async fn receive_callback(
    State(slot): State<CallbackSlot>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    if !params.is_callback() {
        return (StatusCode::NOT_FOUND, Html(""));
    }

    let page = if params.error.is_some() {
        FAILURE_PAGE
    } else {
        SUCCESS_PAGE
    };

    let Some(sender) = slot.lock().await.take() else {
        debug!("ignoring repeated consent callback");
        return (StatusCode::CONFLICT, Html(FAILURE_PAGE));
    };
    if sender.send(params).is_err() {
        warn!("consent callback arrived after the flow gave up");
        return (StatusCode::GONE, Html(FAILURE_PAGE));
    }
    (StatusCode::OK, Html(page))
}
