//! # mailgate-core
//!
//! One entry point for sending mail through several hosted providers.
//!
//! This crate provides:
//! - [`GmailClient`] - Gmail REST API with browser consent and silent refresh
//! - [`GraphClient`] - Microsoft Graph with the client-credentials grant
//! - [`EmailController`] - dispatch by [`ProviderKind`]
//! - [`ReputationTracker`] - per-IP sender reputation, fed by a [`ReputationSource`]
//! - [`Config`] - TOML configuration for both providers
//!
//! ## Example
//!
//! ```ignore
//! use mailgate_core::{Config, EmailController, ProviderKind};
//!
//! let config = Config::load()?;
//! let mut controller = EmailController::connect(&config).await?;
//! controller
//!     .send_email("recipient@example.com", "Hello", "Body", ProviderKind::Google)
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod controller;
mod error;
pub mod message;
pub mod provider;
pub mod reputation;

pub use config::{Config, GoogleClientSecrets, GoogleConfig, MicrosoftConfig};
pub use controller::{ControllerBuilder, EmailController};
pub use error::{Error, Result};
pub use message::Message;
pub use provider::{GmailClient, GraphClient, MailProvider, ProviderKind, SendReceipt};
pub use reputation::{
    ReputationRecord, ReputationSource, ReputationStatus, ReputationTracker,
    StaticReputationSource,
};
