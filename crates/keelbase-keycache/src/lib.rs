//! keelbase-keycache: two-level cipher-key cache.
//!
//! In-memory index of derived encryption keys for every keelbase process
//! that participates in encryption:
//!
//! ```text
//! { domain_id -> { (base_cipher_id, salt) -> CipherKey } }
//! ```
//!
//! Two lookup schemes are supported: the exact
//! `(domain_id, base_cipher_id, salt)` triple recorded in a persisted
//! header, and the latest key for a domain for new encryptions. Cache
//! misses surface as `KeyNotFound`; the caller is responsible for
//! fetching the base key from the external key manager and re-admitting
//! it.

pub mod cache;
pub mod domain_index;
pub mod error;

pub use cache::KeyCache;
pub use domain_index::DomainKeyIndex;
pub use error::KeyCacheError;
