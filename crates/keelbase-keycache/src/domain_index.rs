//! Per-domain cipher key index.
//!
//! Keys are indexed by `(base_cipher_id, salt)` and never mutate once
//! admitted: re-admitting identical key material is a no-op, re-admitting
//! different material under the same pair is an error. The index also
//! remembers which entry arrived through the latest-key path so encryptors
//! can ask for "the current key" without knowing its identity.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use keelbase_crypto::{BaseCipherId, CipherKey, CipherSalt, DomainId};

use crate::error::KeyCacheError;

pub struct DomainKeyIndex {
    domain_id: DomainId,
    keys: HashMap<(BaseCipherId, CipherSalt), Arc<CipherKey>>,
    latest: Option<(BaseCipherId, CipherSalt)>,
}

impl DomainKeyIndex {
    pub fn new(domain_id: DomainId) -> Self {
        Self {
            domain_id,
            keys: HashMap::new(),
            latest: None,
        }
    }

    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    fn admit(&mut self, key: Arc<CipherKey>) -> Result<Arc<CipherKey>, KeyCacheError> {
        match self.keys.entry((key.base_cipher_id(), key.salt())) {
            Entry::Occupied(entry) => {
                let existing = entry.get();
                if **existing == *key {
                    Ok(existing.clone())
                } else {
                    Err(KeyCacheError::UpdateCipher {
                        domain_id: self.domain_id,
                        base_cipher_id: key.base_cipher_id(),
                        salt: key.salt(),
                    })
                }
            }
            Entry::Vacant(entry) => Ok(entry.insert(key).clone()),
        }
    }

    /// Admit a base key delivered by the key manager as the domain's
    /// current key. A fresh salt is generated; the entry becomes the
    /// latest key. Re-delivery of the current key material is a no-op.
    pub fn insert_latest(
        &mut self,
        base_cipher_id: BaseCipherId,
        base_cipher: &[u8],
    ) -> Result<Arc<CipherKey>, KeyCacheError> {
        if let Ok(latest) = self.get_latest() {
            if latest.base_cipher_id() == base_cipher_id && latest.base_cipher() == base_cipher {
                return Ok(latest);
            }
        }
        let key = Arc::new(CipherKey::new(self.domain_id, base_cipher_id, base_cipher)?);
        let inserted = self.admit(key)?;
        self.latest = Some((inserted.base_cipher_id(), inserted.salt()));
        Ok(inserted)
    }

    /// Admit a base key at a caller-supplied salt, typically recovered
    /// from a persisted header during decryption. Does not change the
    /// latest key.
    pub fn insert_exact(
        &mut self,
        base_cipher_id: BaseCipherId,
        base_cipher: &[u8],
        salt: CipherSalt,
    ) -> Result<Arc<CipherKey>, KeyCacheError> {
        if let Some(existing) = self.keys.get(&(base_cipher_id, salt)) {
            if existing.base_cipher() == base_cipher {
                return Ok(existing.clone());
            }
            return Err(KeyCacheError::UpdateCipher {
                domain_id: self.domain_id,
                base_cipher_id,
                salt,
            });
        }
        let key = Arc::new(CipherKey::with_salt(
            self.domain_id,
            base_cipher_id,
            base_cipher,
            salt,
        )?);
        self.admit(key)
    }

    /// The most recently admitted latest key.
    pub fn get_latest(&self) -> Result<Arc<CipherKey>, KeyCacheError> {
        self.latest
            .and_then(|pair| self.keys.get(&pair))
            .cloned()
            .ok_or(KeyCacheError::KeyNotFound {
                domain_id: self.domain_id,
            })
    }

    /// The key admitted under `(base_cipher_id, salt)`.
    pub fn get_exact(
        &self,
        base_cipher_id: BaseCipherId,
        salt: CipherSalt,
    ) -> Result<Arc<CipherKey>, KeyCacheError> {
        self.keys
            .get(&(base_cipher_id, salt))
            .cloned()
            .ok_or(KeyCacheError::KeyNotFound {
                domain_id: self.domain_id,
            })
    }

    /// Point-in-time snapshot of every cached key.
    pub fn all(&self) -> Vec<Arc<CipherKey>> {
        self.keys.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drop every cached key. Key material zeroizes when the last holder
    /// releases its handle.
    pub fn cleanup(&mut self) {
        self.keys.clear();
        self.latest = None;
    }
}
