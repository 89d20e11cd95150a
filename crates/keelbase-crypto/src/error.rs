use thiserror::Error;

use crate::types::{BaseCipherId, CipherSalt, DomainId};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Malformed encryption header: {0}")]
    HeaderMalformed(String),

    #[error("Cipher key does not match header identity {domain_id}/{base_cipher_id}/{salt}")]
    KeyMismatch {
        domain_id: DomainId,
        base_cipher_id: BaseCipherId,
        salt: CipherSalt,
    },

    #[error("Authentication token mismatch")]
    AuthTokenMismatch,

    #[error("Crypto backend failure: {0}")]
    Backend(String),

    #[error("Bad signing key: {0}")]
    BadKey(String),

    #[error("Malformed auth token payload: {0}")]
    TokenMalformed(String),

    #[error("Base cipher key too short: expected at least {min} bytes, got {got}")]
    InvalidBaseKeyLength { min: usize, got: usize },

    #[error("Random number generation failed: {0}")]
    Rng(String),
}
