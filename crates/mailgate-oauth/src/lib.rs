//! Token acquisition for the mailgate provider clients.
//!
//! Gmail is a desktop application: the user grants consent once in the
//! browser (PKCE, redirect to a one-shot listener on `127.0.0.1`), and the
//! refresh token renews access afterwards. Microsoft Graph runs app-only with
//! the client-credentials grant against a tenant-scoped authority.
//!
//! Each grant is a [`TokenProvider`], so provider clients can be handed a
//! stub in tests.
//!
//! ```ignore
//! use mailgate_oauth::{ClientCredentialGrant, OAuthClient, Provider, TokenProvider};
//!
//! let client = OAuthClient::new("app-id", Provider::microsoft("tenant-id")?)
//!     .with_client_secret(secret);
//! let token = ClientCredentialGrant::new(client).fetch_token(None).await?;
//! assert!(token.is_valid());
//! ```
//!
//! Tokens count as expired 60 seconds early and are never written to disk.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod provider;
pub mod source;
pub mod token;

pub use error::{Error, Result};
pub use flow::{AuthorizationCodeFlow, CallbackParams, LoopbackListener, OAuthClient, PkceChallenge};
pub use provider::Provider;
pub use source::{
    BrowserLauncher, ClientCredentialGrant, GrantKind, InteractiveConsent, RefreshTokenGrant,
    TokenProvider,
};
pub use token::Token;
