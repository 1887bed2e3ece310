//! PKCE (RFC 7636) verifier/challenge pairs and CSRF state values.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Only S256 is ever sent; `plain` is not supported.
const CHALLENGE_METHOD: &str = "S256";

/// Secret verifier kept locally plus the hashed challenge sent with consent.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    verifier: String,
    challenge: String,
}

impl PkceChallenge {
    /// Generates a fresh pair from 32 random bytes (a 43-character verifier).
    #[must_use]
    pub fn generate() -> Self {
        Self::from_verifier(random_token(32))
    }

    /// Derives the S256 challenge for a known verifier.
    #[must_use]
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }

    /// Sent only to the token endpoint.
    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// Sent in the consent URL.
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Always `S256`.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

/// Random URL-safe token of `len` bytes of entropy.
pub(crate) fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
