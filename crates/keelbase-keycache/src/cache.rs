//! Process-wide cipher key cache.
//!
//! Two-level structure: `domain_id -> DomainKeyIndex`, each level behind
//! its own reader-writer lock. Lookups take read locks only; admissions
//! and evictions serialize against readers per level. The cache is
//! consulted by encryptors and decryptors to resolve the
//! `(domain_id, base_cipher_id, salt)` triples recorded in headers; on a
//! miss the caller fetches the base key from the external key manager and
//! re-admits it via `insert_exact`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use keelbase_crypto::{BaseCipherId, CipherKey, CipherSalt, DomainId};
use parking_lot::RwLock;

use crate::domain_index::DomainKeyIndex;
use crate::error::KeyCacheError;

pub struct KeyCache {
    domains: RwLock<HashMap<DomainId, Arc<RwLock<DomainKeyIndex>>>>,
}

static KEY_CACHE: OnceLock<KeyCache> = OnceLock::new();

impl KeyCache {
    /// An empty, standalone cache. Production code goes through
    /// `instance()`; standalone caches keep tests independent.
    pub fn new() -> Self {
        Self {
            domains: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide cache, created lazily at first use.
    pub fn instance() -> &'static KeyCache {
        KEY_CACHE.get_or_init(KeyCache::new)
    }

    fn domain_index(&self, domain_id: DomainId) -> Arc<RwLock<DomainKeyIndex>> {
        if let Some(index) = self.domains.read().get(&domain_id) {
            return index.clone();
        }
        self.domains
            .write()
            .entry(domain_id)
            .or_insert_with(|| Arc::new(RwLock::new(DomainKeyIndex::new(domain_id))))
            .clone()
    }

    fn existing_domain_index(
        &self,
        domain_id: DomainId,
    ) -> Result<Arc<RwLock<DomainKeyIndex>>, KeyCacheError> {
        self.domains
            .read()
            .get(&domain_id)
            .cloned()
            .ok_or(KeyCacheError::KeyNotFound { domain_id })
    }

    /// Admit the domain's current base key; see
    /// `DomainKeyIndex::insert_latest`.
    pub fn insert_latest(
        &self,
        domain_id: DomainId,
        base_cipher_id: BaseCipherId,
        base_cipher: &[u8],
    ) -> Result<Arc<CipherKey>, KeyCacheError> {
        let index = self.domain_index(domain_id);
        let mut index = index.write();
        index.insert_latest(base_cipher_id, base_cipher)
    }

    /// Admit a base key at a known salt; see
    /// `DomainKeyIndex::insert_exact`.
    pub fn insert_exact(
        &self,
        domain_id: DomainId,
        base_cipher_id: BaseCipherId,
        base_cipher: &[u8],
        salt: CipherSalt,
    ) -> Result<Arc<CipherKey>, KeyCacheError> {
        let index = self.domain_index(domain_id);
        let mut index = index.write();
        index.insert_exact(base_cipher_id, base_cipher, salt)
    }

    /// The latest key for a domain.
    pub fn get_latest(&self, domain_id: DomainId) -> Result<Arc<CipherKey>, KeyCacheError> {
        let index = self.existing_domain_index(domain_id)?;
        let index = index.read();
        index.get_latest()
    }

    /// The key admitted under `(domain_id, base_cipher_id, salt)`.
    pub fn get_exact(
        &self,
        domain_id: DomainId,
        base_cipher_id: BaseCipherId,
        salt: CipherSalt,
    ) -> Result<Arc<CipherKey>, KeyCacheError> {
        let index = self.existing_domain_index(domain_id)?;
        let index = index.read();
        index.get_exact(base_cipher_id, salt)
    }

    /// Point-in-time snapshot of every key cached for a domain. Empty
    /// when the domain is unknown.
    pub fn all_for_domain(&self, domain_id: DomainId) -> Vec<Arc<CipherKey>> {
        match self.existing_domain_index(domain_id) {
            Ok(index) => {
                let index = index.read();
                index.all()
            }
            Err(_) => Vec::new(),
        }
    }

    /// Drop and zeroize a single domain, e.g. when the domain is
    /// destroyed.
    pub fn reset_domain(&self, domain_id: DomainId) {
        let removed = self.domains.write().remove(&domain_id);
        if let Some(index) = removed {
            index.write().cleanup();
        }
    }

    /// Drop every domain. Ensures cached plaintext key material does not
    /// outlive the cache into a process core dump.
    pub fn cleanup(&self) {
        let mut domains = self.domains.write();
        for (_, index) in domains.drain() {
            index.write().cleanup();
        }
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}
