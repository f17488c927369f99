//! # zero-link-crypto
//!
//! Cryptographic primitives for the zero-link OAuth engine.
//!
//! - PKCE (`S256` only) verifier/challenge pairs
//! - State tokens and other opaque random tokens
//! - XChaCha20-Poly1305 encryption of provider tokens at rest
//! - BLAKE3 hashing for log-safe identifiers, Argon2id for local passwords
//!
//! ## Security Properties
//!
//! - Key material held by [`TokenCipher`] is zeroized on drop
//! - Decryption never returns unauthenticated plaintext
//! - No unsafe code

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod encryption;
pub mod errors;
pub mod hashing;
pub mod pkce;
pub mod random;
pub mod utils;

pub use constants::*;
pub use encryption::*;
pub use errors::{CryptoError, Result};
pub use hashing::*;
pub use pkce::*;
pub use random::*;
pub use utils::current_timestamp;
