//! keelbase-crypto: in-process block encryption core for keelbase.
//!
//! Encrypts and decrypts arbitrary data blocks (commit records, storage
//! pages, backup files) at rest:
//!
//! - working keys derived from externally supplied base keys via
//!   HMAC-SHA-256, bound to an encryption domain and a random salt
//! - authenticated AES-256-CTR with a fixed 104-byte self-describing
//!   header carrying one combined or two per-region auth tokens
//! - ECDSA P-256 signing and verification for inter-process auth tokens
//!
//! Key caching lives in `keelbase-keycache`; this crate owns the
//! primitives and the cipher engine.

pub mod aes_ctr;
pub mod derivation;
pub mod digest;
pub mod error;
pub mod header;
pub mod key;
mod ratelimit;
pub mod token;
pub mod types;

pub use aes_ctr::{generate_iv, BlockDecryptor, BlockEncryptor};
pub use derivation::derive_cipher;
pub use digest::{compute_auth_token, hmac_sha256, HmacSha256};
pub use error::CryptoError;
pub use header::{
    EncryptHeader, HeaderCipherDetails, TextCipherDetails, ENCRYPT_HEADER_VERSION,
    ENCRYPT_MODE_AES_256_CTR, HEADER_SIZE,
};
pub use key::CipherKey;
pub use token::{
    deserialize_token, generate_keypair, serialize_token, sign_token, verify_token, AuthToken,
    SignedAuthToken,
};
pub use types::{
    AuthTokenMode, BaseCipherId, CipherSalt, DomainId, AES_256_IV_LENGTH, AES_256_KEY_LENGTH,
    AUTH_TOKEN_SIZE, MIN_BASE_KEY_LENGTH,
};
