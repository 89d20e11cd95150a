//! Working-key derivation from externally supplied base cipher keys.
//!
//! The derived key is HMAC-SHA-256 keyed with the base cipher over
//! `salt (8 LE) || domain_id (8 LE, two's complement)`. The output length
//! matches AES-256 exactly, so the digest is used as the working key
//! without further expansion.

use crate::digest::hmac_sha256;
use crate::error::CryptoError;
use crate::types::{CipherSalt, DomainId, AES_256_KEY_LENGTH};

/// Derive the AES-256 working key for `(base_cipher, domain_id, salt)`.
///
/// Pure: identical inputs always produce identical output.
pub fn derive_cipher(
    base_cipher: &[u8],
    domain_id: DomainId,
    salt: CipherSalt,
) -> Result<[u8; AES_256_KEY_LENGTH], CryptoError> {
    let mut message = [0u8; 16];
    message[..8].copy_from_slice(&salt.to_le_bytes());
    message[8..].copy_from_slice(&domain_id.to_le_bytes());
    hmac_sha256(base_cipher, &message)
}
