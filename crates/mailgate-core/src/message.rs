//! Outgoing plain-text message.

use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

use crate::error::{Error, Result};

/// A plain-text message to a single recipient.
///
/// Built per send call and not retained afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Checks that the message can be put on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] for an empty recipient or for line
    /// breaks in the recipient or subject (header injection).
    pub fn validate(&self) -> Result<()> {
        if self.to.trim().is_empty() {
            return Err(Error::InvalidMessage("No recipient specified".into()));
        }
        if has_line_break(&self.to) {
            return Err(Error::InvalidMessage("Recipient contains a line break".into()));
        }
        if has_line_break(&self.subject) {
            return Err(Error::InvalidMessage("Subject contains a line break".into()));
        }
        Ok(())
    }

    /// Builds the RFC 5322 formatted message.
    #[must_use]
    pub fn to_rfc5322(&self) -> String {
        let mut message = String::new();

        let _ = write!(message, "To: {}\r\n", self.to.trim());
        let _ = write!(message, "Subject: {}\r\n", encode_header(&self.subject));
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n");

        if fits_7bit(&self.body) {
            message.push_str("Content-Transfer-Encoding: 7bit\r\n\r\n");
            message.push_str(&normalize_newlines(&self.body));
        } else {
            message.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
            let encoded = STANDARD.encode(self.body.as_bytes());
            for line in encoded.as_bytes().chunks(76) {
                // base64 output is ASCII
                message.push_str(&String::from_utf8_lossy(line));
                message.push_str("\r\n");
            }
        }

        message
    }

    /// Base64url form of the RFC 5322 message, as the Gmail `raw` field expects.
    #[must_use]
    pub fn to_gmail_raw(&self) -> String {
        URL_SAFE.encode(self.to_rfc5322().as_bytes())
    }
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\r', '\n'])
}

/// RFC 2047 `B` encoding for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// RFC 5322 line limit, excluding the CRLF.
const MAX_LINE_OCTETS: usize = 998;

/// ASCII with every line inside the RFC 5322 limit.
fn fits_7bit(body: &str) -> bool {
    body.is_ascii()
        && body
            .lines()
            .all(|line| line.len() <= MAX_LINE_OCTETS)
}

fn normalize_newlines(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\n', "\r\n")
}
