//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic operation errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key size
    #[error("Invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize {
        /// Expected key size in bytes
        expected: usize,
        /// Actual key size in bytes
        actual: usize,
    },

    /// Ciphertext is too short to contain a nonce and tag
    #[error("Ciphertext too short: {0} bytes")]
    CiphertextTooShort(usize),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (tampered data, wrong key or wrong associated data)
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Invalid input data
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// Random number generation failed
    #[error("Random number generation failed: {0}")]
    RandomGenerationFailed(String),

    /// Argon2 hashing failed
    #[error("Argon2 hashing failed: {0}")]
    Argon2Failed(String),

    /// Invalid hash format
    #[error("Invalid hash format")]
    InvalidHashFormat,
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;
