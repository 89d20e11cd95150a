use keelbase_crypto::{BaseCipherId, CipherSalt, CryptoError, DomainId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyCacheError {
    #[error("No cipher key cached for domain {domain_id}")]
    KeyNotFound { domain_id: DomainId },

    #[error("Attempt to redefine cipher key {base_cipher_id}/{salt} in domain {domain_id}")]
    UpdateCipher {
        domain_id: DomainId,
        base_cipher_id: BaseCipherId,
        salt: CipherSalt,
    },

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
