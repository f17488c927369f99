//! Cryptographic constants and domain separation strings.
//!
//! Changing any of these invalidates ciphertexts already stored.

/// Size of the token encryption key in bytes (256 bits)
pub const TOKEN_KEY_SIZE: usize = 32;

/// Size of XChaCha20-Poly1305 nonces in bytes (192 bits)
pub const NONCE_SIZE: usize = 24;

/// Size of XChaCha20-Poly1305 authentication tags in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Random bytes behind a state token (256 bits, 43 URL-safe chars)
pub const STATE_TOKEN_BYTES: usize = 32;

/// Minimum PKCE verifier length (RFC 7636 § 4.1)
pub const PKCE_VERIFIER_MIN_LEN: usize = 43;

/// Maximum PKCE verifier length (RFC 7636 § 4.1)
pub const PKCE_VERIFIER_MAX_LEN: usize = 128;

/// Verifier length used by `generate_pkce_pair`
pub const PKCE_VERIFIER_DEFAULT_LEN: usize = 64;

/// Number of hash bytes kept by `hash_for_log`
pub const LOG_HASH_BYTES: usize = 8;

/// Domain separation for stored provider tokens
/// Format: "zero-link:token:v1" || identity_id || field
pub const DOMAIN_TOKEN_AAD: &str = "zero-link:token:v1";

/// Argon2id parameters for local password hashing
pub mod argon2_params {
    use argon2::{Params, Version};

    /// Memory cost: 64 MiB
    pub const MEMORY_COST: u32 = 64 * 1024;

    /// Time cost: 3 iterations
    pub const TIME_COST: u32 = 3;

    /// Parallelism: 1 thread
    pub const PARALLELISM: u32 = 1;

    /// Output length: 32 bytes
    pub const OUTPUT_LENGTH: usize = 32;

    /// Get Argon2id parameters, falling back to the crate defaults if rejected
    pub fn get_params() -> Params {
        Params::new(MEMORY_COST, TIME_COST, PARALLELISM, Some(OUTPUT_LENGTH))
            .unwrap_or_default()
    }

    /// Argon2 version
    pub const VERSION: Version = Version::V0x13;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_bounds_are_ordered() {
        assert!(PKCE_VERIFIER_MIN_LEN <= PKCE_VERIFIER_DEFAULT_LEN);
        assert!(PKCE_VERIFIER_DEFAULT_LEN <= PKCE_VERIFIER_MAX_LEN);
    }

    #[test]
    fn test_state_entropy_at_least_128_bits() {
        assert!(STATE_TOKEN_BYTES * 8 >= 128);
    }

    #[test]
    fn test_argon2_params_are_valid() {
        let params = argon2_params::get_params();
        assert_eq!(params.m_cost(), argon2_params::MEMORY_COST);
        assert_eq!(params.t_cost(), argon2_params::TIME_COST);
    }
}
