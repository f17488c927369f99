//! Encryption of provider tokens using XChaCha20-Poly1305.

use crate::{constants::*, errors::*, random::generate_nonce};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Encrypt data using XChaCha20-Poly1305 AEAD
///
/// # Arguments
///
/// * `key` - 32-byte encryption key
/// * `plaintext` - Data to encrypt
/// * `nonce` - 24-byte nonce (MUST be unique per key)
/// * `aad` - Associated authenticated data (not encrypted, but authenticated)
///
/// # Returns
///
/// Ciphertext with 16-byte authentication tag appended
pub fn encrypt(
    key: &[u8; TOKEN_KEY_SIZE],
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let xnonce = XNonce::from_slice(nonce);

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(xnonce, payload)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Decrypt data using XChaCha20-Poly1305 AEAD
///
/// Fails with [`CryptoError::DecryptionFailed`] if the tag does not verify.
pub fn decrypt(
    key: &[u8; TOKEN_KEY_SIZE],
    ciphertext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let xnonce = XNonce::from_slice(nonce);

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(xnonce, payload)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Build the associated data binding a token blob to its identity and field
///
/// Format: "zero-link:token:v1" || identity_id || field
pub fn token_aad(identity_id: &Uuid, field: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(DOMAIN_TOKEN_AAD.len() + 16 + field.len());
    aad.extend_from_slice(DOMAIN_TOKEN_AAD.as_bytes());
    aad.extend_from_slice(identity_id.as_bytes());
    aad.extend_from_slice(field.as_bytes());
    aad
}

/// Symmetric cipher for provider tokens at rest.
///
/// Holds the process-wide key supplied at startup. Blobs are laid out as
/// `nonce (24) || ciphertext || tag (16)` with a fresh random nonce per call.
pub struct TokenCipher {
    key: Zeroizing<[u8; TOKEN_KEY_SIZE]>,
}

impl TokenCipher {
    /// Create a cipher from raw key bytes
    pub fn new(key: [u8; TOKEN_KEY_SIZE]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Create a cipher from a hex encoded 32-byte key
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(key_hex.trim())
                .map_err(|e| CryptoError::InvalidInput(format!("key is not hex: {}", e)))?,
        );
        if bytes.len() != TOKEN_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                expected: TOKEN_KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let mut key = [0u8; TOKEN_KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Create a cipher with a freshly generated random key
    pub fn generate() -> Result<Self> {
        let bytes = Zeroizing::new(crate::random::generate_random_bytes(TOKEN_KEY_SIZE)?);
        let mut key = [0u8; TOKEN_KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext || tag`
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let nonce = generate_nonce()?;
        let ciphertext = encrypt(&self.key, plaintext, &nonce, aad)?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a blob produced by [`TokenCipher::encrypt`]
    pub fn decrypt(&self, blob: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::CiphertextTooShort(blob.len()));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        decrypt(&self.key, ciphertext, &nonce, aad).map(Zeroizing::new)
    }

    /// Encrypt a UTF-8 token string
    pub fn encrypt_str(&self, token: &str, aad: &[u8]) -> Result<Vec<u8>> {
        self.encrypt(token.as_bytes(), aad)
    }

    /// Decrypt a blob back into a UTF-8 token string
    pub fn decrypt_str(&self, blob: &[u8], aad: &[u8]) -> Result<Zeroizing<String>> {
        let plaintext = self.decrypt(blob, aad)?;
        let text = std::str::from_utf8(&plaintext).map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; 32];
        let plaintext = b"secret message";
        let nonce = generate_nonce().unwrap();
        let aad = b"additional authenticated data";

        let ciphertext = encrypt(&key, plaintext, &nonce, aad).unwrap();
        let decrypted = decrypt(&key, &ciphertext, &nonce, aad).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());
    }

    #[test]
    fn test_cipher_roundtrip_for_token_strings() {
        let cipher = TokenCipher::generate().unwrap();
        let aad = token_aad(&Uuid::new_v4(), "access");

        for token in ["", "ya29.a0AfH6SM", &"x".repeat(4096)] {
            let blob = cipher.encrypt_str(token, &aad).unwrap();
            assert_eq!(cipher.decrypt_str(&blob, &aad).unwrap().as_str(), token);
        }
    }

    #[test]
    fn test_wrong_key_fails_with_decryption_failed() {
        let cipher = TokenCipher::new([1u8; 32]);
        let other = TokenCipher::new([2u8; 32]);
        let aad = token_aad(&Uuid::new_v4(), "access");

        let blob = cipher.encrypt_str("gho_secret", &aad).unwrap();
        assert!(matches!(
            other.decrypt_str(&blob, &aad),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_blob_fails() {
        let cipher = TokenCipher::generate().unwrap();
        let aad = token_aad(&Uuid::new_v4(), "refresh");

        let mut blob = cipher.encrypt_str("1//0refresh", &aad).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        assert!(matches!(
            cipher.decrypt(&blob, &aad),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_blob_bound_to_identity_and_field() {
        let cipher = TokenCipher::generate().unwrap();
        let identity = Uuid::new_v4();
        let blob = cipher
            .encrypt_str("token", &token_aad(&identity, "access"))
            .unwrap();

        assert!(cipher
            .decrypt(&blob, &token_aad(&identity, "refresh"))
            .is_err());
        assert!(cipher
            .decrypt(&blob, &token_aad(&Uuid::new_v4(), "access"))
            .is_err());
    }

    #[test]
    fn test_nonce_is_fresh_per_encryption() {
        let cipher = TokenCipher::generate().unwrap();
        let a = cipher.encrypt_str("same", b"aad").unwrap();
        let b = cipher.encrypt_str("same", b"aad").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_blob_rejected() {
        let cipher = TokenCipher::generate().unwrap();
        assert!(matches!(
            cipher.decrypt(&[0u8; 10], b""),
            Err(CryptoError::CiphertextTooShort(10))
        ));
    }

    #[test]
    fn test_from_hex() {
        assert!(TokenCipher::from_hex(&"ab".repeat(32)).is_ok());
        assert!(matches!(
            TokenCipher::from_hex(&"ab".repeat(16)),
            Err(CryptoError::InvalidKeySize { expected: 32, actual: 16 })
        ));
        assert!(TokenCipher::from_hex("not hex").is_err());
    }
}
