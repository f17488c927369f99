//! Random material: nonces, state tokens and opaque handles.

use crate::{constants::*, errors::*};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Fill a fresh buffer of `len` bytes from the thread CSPRNG
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng()
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::RandomGenerationFailed(e.to_string()))?;
    Ok(bytes)
}

/// Generate a random XChaCha20-Poly1305 nonce
pub fn generate_nonce() -> Result<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng()
        .try_fill_bytes(&mut nonce)
        .map_err(|e| CryptoError::RandomGenerationFailed(e.to_string()))?;
    Ok(nonce)
}

/// Generate an opaque URL-safe token carrying `num_bytes` of entropy
pub fn generate_random_token(num_bytes: usize) -> Result<String> {
    if num_bytes < 16 {
        return Err(CryptoError::InvalidInput(format!(
            "token needs at least 16 random bytes, got {}",
            num_bytes
        )));
    }
    let bytes = generate_random_bytes(num_bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate a state token for an authorization request.
///
/// 256 bits from the CSPRNG, base64url without padding.
pub fn generate_state() -> Result<String> {
    generate_random_token(STATE_TOKEN_BYTES)
}
