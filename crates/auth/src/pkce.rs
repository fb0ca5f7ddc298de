//! PKCE (Proof Key for Code Exchange) helpers
//!
//! Implements the S256 method of RFC 7636: the verifier is 32 random bytes
//! encoded as unpadded base64url (43 characters) and the challenge is
//! `BASE64URL(SHA256(verifier))`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Challenge method sent on the authorization URL
pub const CHALLENGE_METHOD: &str = "S256";

const VERIFIER_BYTES: usize = 32;

/// Generate a cryptographically secure code verifier
#[must_use]
pub fn generate_code_verifier() -> String {
    let mut random_bytes = [0u8; VERIFIER_BYTES];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Derive the S256 code challenge for `verifier`
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Verifier and its derived challenge
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// Kept secret until the token exchange
    pub code_verifier: String,

    /// Sent with the authorization request
    pub code_challenge: String,
}

impl PkcePair {
    /// Generate a fresh verifier/challenge pair
    ///
    /// ```
    /// use sessionkit_auth::pkce::{generate_code_challenge, PkcePair};
    ///
    /// let pair = PkcePair::generate();
    /// assert_eq!(pair.code_verifier.len(), 43);
    /// assert_eq!(pair.code_challenge, generate_code_challenge(&pair.code_verifier));
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge }
    }

    /// Challenge method (always `S256`)
    #[must_use]
    pub const fn challenge_method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for pkce.
    use super::*;

    /// Validates `generate_code_verifier` behavior for the verifier format
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the verifier is 43 characters long.
    /// - Ensures only base64url characters appear.
    #[test]
    fn test_code_verifier_format() {
        let verifier = generate_code_verifier();

        assert_eq!(verifier.len(), 43);
        assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    /// Validates `generate_code_verifier` behavior for the uniqueness
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures two verifiers differ.
    #[test]
    fn test_code_verifier_uniqueness() {
        assert_ne!(generate_code_verifier(), generate_code_verifier());
    }

    /// Validates `generate_code_challenge` behavior for the RFC 7636 test
    /// vector scenario.
    ///
    /// Assertions:
    /// - Confirms the challenge for the appendix B verifier matches the
    ///   published value.
    #[test]
    fn test_code_challenge_rfc_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            generate_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    /// Validates `PkcePair::generate` behavior for the pair consistency
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the challenge is derived from the verifier.
    /// - Confirms the method is `S256`.
    #[test]
    fn test_pair_consistency() {
        let pair = PkcePair::generate();
        assert_eq!(pair.code_challenge, generate_code_challenge(&pair.code_verifier));
        assert_eq!(pair.challenge_method(), "S256");
    }
}
