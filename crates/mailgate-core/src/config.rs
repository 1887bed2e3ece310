//! Configuration for the provider clients.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [google]
//! credentials_file = "client_secret.json"
//!
//! [microsoft]
//! client_id = "00000000-0000-0000-0000-000000000000"
//! client_secret = "..."
//! tenant_id = "contoso.onmicrosoft.com"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{Error, Result};

/// Default Gmail REST API host.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

/// Default Microsoft Graph base URL.
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// File name looked up in the working directory by [`Config::load`].
const LOCAL_CONFIG_FILE: &str = "mailgate.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Gmail client settings.
    pub google: GoogleConfig,
    /// Microsoft Graph client settings.
    pub microsoft: MicrosoftConfig,
}

/// Gmail client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    /// Path to the `client_secret_*.json` downloaded from the Google console.
    pub credentials_file: PathBuf,
    /// Gmail REST API host.
    #[serde(default = "default_gmail_api_base")]
    pub api_base: String,
    /// Loopback port for the consent callback (0 picks a free port).
    #[serde(default)]
    pub callback_port: u16,
    /// How long to wait for the user to finish consent.
    #[serde(default = "default_consent_timeout_secs")]
    pub consent_timeout_secs: u64,
}

impl GoogleConfig {
    /// Creates settings with defaults for everything but the credentials file.
    #[must_use]
    pub fn new(credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            credentials_file: credentials_file.into(),
            api_base: default_gmail_api_base(),
            callback_port: 0,
            consent_timeout_secs: default_consent_timeout_secs(),
        }
    }

    /// Consent timeout as a [`Duration`].
    #[must_use]
    pub const fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }
}

/// Microsoft Graph client settings (app-only).
#[derive(Clone, Deserialize)]
pub struct MicrosoftConfig {
    /// Application (client) id.
    pub client_id: String,
    /// Client secret.
    #[serde(deserialize_with = "deserialize_secret")]
    pub client_secret: SecretString,
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Identity platform host.
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    /// Graph base URL.
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
    /// Mailbox to act on (`/users/{mailbox}`); `/me` when unset.
    #[serde(default)]
    pub mailbox: Option<String>,
}

impl fmt::Debug for MicrosoftConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrosoftConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("authority_host", &self.authority_host)
            .field("graph_base", &self.graph_base)
            .field("mailbox", &self.mailbox)
            .finish()
    }
}

impl MicrosoftConfig {
    /// Creates settings pointing at the public Microsoft cloud.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            tenant_id: tenant_id.into(),
            authority_host: default_authority_host(),
            graph_base: default_graph_base(),
            mailbox: None,
        }
    }

    /// Returns the client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Checks that all credentials are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret()),
            ("tenant_id", self.tenant_id.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("microsoft.{field} is empty")));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or credentials are empty.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.microsoft.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Loads configuration from the default locations.
    ///
    /// Looks for `./mailgate.toml`, then `<config dir>/mailgate/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if no file is found or the one found is invalid.
    pub fn load() -> Result<Self> {
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("mailgate").join("config.toml"));
        }

        candidates
            .iter()
            .find(|path| path.exists())
            .map_or_else(
                || Err(Error::Config("No configuration file found".to_string())),
                |path| Self::from_file(path),
            )
    }
}

/// OAuth client registration from a Google `client_secret_*.json` file.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleClientSecrets {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret (desktop clients have one, though it is not confidential).
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Authorization endpoint.
    #[serde(default)]
    pub auth_uri: Option<String>,
    /// Token endpoint.
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<GoogleClientSecrets>,
    web: Option<GoogleClientSecrets>,
}

impl GoogleClientSecrets {
    /// Parses the JSON document, accepting `installed` or `web` client types.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or holds neither client type.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(content)?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::Config("credentials file has no \"installed\" or \"web\" client".into())
        })
    }

    /// Reads and parses a credentials file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read Google credentials {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_gmail_api_base() -> String {
    GMAIL_API_BASE.to_string()
}

fn default_graph_base() -> String {
    GRAPH_API_BASE.to_string()
}

fn default_authority_host() -> String {
    mailgate_oauth::provider::MICROSOFT_AUTHORITY_HOST.to_string()
}

const fn default_consent_timeout_secs() -> u64 {
    300
}
