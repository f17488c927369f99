//! PKCE (RFC 7636) with the `S256` method.
//!
//! The `plain` method is intentionally absent.

use crate::{constants::*, errors::*, hashing::constant_time_compare};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

/// RFC 3986 unreserved characters
const UNRESERVED: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Challenge method sent alongside every challenge
pub const PKCE_METHOD: &str = "S256";

/// A code verifier and its derived challenge
#[derive(Clone)]
pub struct PkcePair {
    /// Secret verifier, kept server side until the code exchange
    pub verifier: String,
    /// `BASE64URL(SHA256(verifier))`, sent in the authorization URL
    pub challenge: String,
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Generate a PKCE pair with the default verifier length
pub fn generate_pkce_pair() -> Result<PkcePair> {
    generate_pkce_pair_with_length(PKCE_VERIFIER_DEFAULT_LEN)
}

/// Generate a PKCE pair whose verifier has exactly `len` characters
pub fn generate_pkce_pair_with_length(len: usize) -> Result<PkcePair> {
    if !(PKCE_VERIFIER_MIN_LEN..=PKCE_VERIFIER_MAX_LEN).contains(&len) {
        return Err(CryptoError::InvalidInput(format!(
            "PKCE verifier length must be within {}..={}, got {}",
            PKCE_VERIFIER_MIN_LEN, PKCE_VERIFIER_MAX_LEN, len
        )));
    }

    let mut rng = rand::thread_rng();
    let verifier: String = (0..len)
        .map(|_| UNRESERVED[rng.gen_range(0..UNRESERVED.len())] as char)
        .collect();
    let challenge = pkce_challenge(&verifier);

    Ok(PkcePair {
        verifier,
        challenge,
    })
}

/// Compute the `S256` challenge for a verifier
pub fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Check a verifier against a previously issued challenge
pub fn verify_pkce(verifier: &str, challenge: &str) -> bool {
    constant_time_compare(pkce_challenge(verifier).as_bytes(), challenge.as_bytes())
}
