//! Immutable derived cipher keys.
//!
//! A `CipherKey` pairs the base key material received from the external
//! key manager with the AES-256 working key derived from it. Instances
//! never change after construction; shared access goes through
//! `Arc<CipherKey>` handles. Key bytes are zeroized on drop.

use std::sync::OnceLock;
use std::time::Instant;

use zeroize::Zeroize;

use crate::derivation::derive_cipher;
use crate::error::CryptoError;
use crate::types::{
    BaseCipherId, CipherSalt, DomainId, AES_256_KEY_LENGTH, MIN_BASE_KEY_LENGTH,
};

/// Milliseconds elapsed since the first key was constructed in this process.
/// Monotonic; used only to order key creation for lifetime accounting.
fn monotonic_millis() -> u64 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let anchor = *ANCHOR.get_or_init(Instant::now);
    Instant::now().duration_since(anchor).as_millis() as u64
}

fn random_salt() -> Result<CipherSalt, CryptoError> {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(CipherSalt::from_le_bytes(bytes))
}

/// An encryption key bound to one domain, one base key, and one salt.
pub struct CipherKey {
    domain_id: DomainId,
    base_cipher_id: BaseCipherId,
    base_cipher: Vec<u8>,
    salt: CipherSalt,
    derived_cipher: [u8; AES_256_KEY_LENGTH],
    created_at: u64,
}

impl CipherKey {
    /// Construct with a fresh random salt.
    pub fn new(
        domain_id: DomainId,
        base_cipher_id: BaseCipherId,
        base_cipher: &[u8],
    ) -> Result<Self, CryptoError> {
        let salt = random_salt()?;
        Self::with_salt(domain_id, base_cipher_id, base_cipher, salt)
    }

    /// Construct at a caller-supplied salt, e.g. when reconstructing a key
    /// referenced from a persisted header.
    pub fn with_salt(
        domain_id: DomainId,
        base_cipher_id: BaseCipherId,
        base_cipher: &[u8],
        salt: CipherSalt,
    ) -> Result<Self, CryptoError> {
        if base_cipher.len() < MIN_BASE_KEY_LENGTH {
            return Err(CryptoError::InvalidBaseKeyLength {
                min: MIN_BASE_KEY_LENGTH,
                got: base_cipher.len(),
            });
        }
        let derived_cipher = derive_cipher(base_cipher, domain_id, salt)?;
        Ok(Self {
            domain_id,
            base_cipher_id,
            base_cipher: base_cipher.to_vec(),
            salt,
            derived_cipher,
            created_at: monotonic_millis(),
        })
    }

    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    pub fn base_cipher_id(&self) -> BaseCipherId {
        self.base_cipher_id
    }

    /// The base key material as received from the key manager.
    pub fn base_cipher(&self) -> &[u8] {
        &self.base_cipher
    }

    pub fn salt(&self) -> CipherSalt {
        self.salt
    }

    /// The AES-256 working key.
    pub fn derived_cipher(&self) -> &[u8; AES_256_KEY_LENGTH] {
        &self.derived_cipher
    }

    /// Monotonic construction timestamp in milliseconds.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}

impl PartialEq for CipherKey {
    fn eq(&self, other: &Self) -> bool {
        self.domain_id == other.domain_id
            && self.base_cipher_id == other.base_cipher_id
            && self.salt == other.salt
            && self.base_cipher == other.base_cipher
            && self.derived_cipher == other.derived_cipher
    }
}

impl Eq for CipherKey {}

impl Drop for CipherKey {
    fn drop(&mut self) {
        self.base_cipher.zeroize();
        self.derived_cipher.zeroize();
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherKey")
            .field("domain_id", &self.domain_id)
            .field("base_cipher_id", &self.base_cipher_id)
            .field("salt", &self.salt)
            .field("base_cipher", &"[REDACTED]")
            .field("derived_cipher", &"[REDACTED]")
            .finish()
    }
}
