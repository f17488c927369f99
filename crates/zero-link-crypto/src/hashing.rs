//! Hashing utilities using BLAKE3 and Argon2id.

use crate::{constants::*, errors::*};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use blake3::Hasher as Blake3Hasher;

/// Hash data using BLAKE3
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake3Hasher::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Short, stable fingerprint of a secret for log correlation.
///
/// Hex of the first 8 bytes of the BLAKE3 hash.
pub fn hash_for_log(data: &[u8]) -> String {
    hex::encode(&blake3_hash(data)[..LOG_HASH_BYTES])
}

/// Hash a password using Argon2id
///
/// # Returns
///
/// PHC-formatted hash string that includes algorithm, parameters, salt, and hash
pub fn hash_password(password: &[u8], salt: &SaltString) -> Result<String> {
    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2_params::VERSION,
        argon2_params::get_params(),
    );

    let password_hash = argon2
        .hash_password(password, salt)
        .map_err(|e| CryptoError::Argon2Failed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a password against an Argon2id hash
///
/// `Ok(())` if the password matches, `Err` otherwise
pub fn verify_password(password: &[u8], hash_str: &str) -> Result<()> {
    let parsed_hash = PasswordHash::new(hash_str).map_err(|_| CryptoError::InvalidHashFormat)?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2_params::VERSION,
        argon2_params::get_params(),
    );

    argon2
        .verify_password(password, &parsed_hash)
        .map_err(|e| CryptoError::Argon2Failed(e.to_string()))
}

/// Generate a random salt for password hashing
pub fn generate_salt() -> SaltString {
    SaltString::generate(&mut rand::thread_rng())
}

/// Compare two byte slices in constant time
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
