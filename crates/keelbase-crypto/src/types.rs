//! Shared constants and identifier types for the encryption core.

/// AES-256 key length in bytes.
pub const AES_256_KEY_LENGTH: usize = 32;

/// AES-CTR initialization vector length in bytes (one full cipher block).
pub const AES_256_IV_LENGTH: usize = 16;

/// Authentication token length in bytes (truncated HMAC-SHA-256).
pub const AUTH_TOKEN_SIZE: usize = 16;

/// Minimum accepted base cipher key length in bytes.
pub const MIN_BASE_KEY_LENGTH: usize = 16;

/// Encryption-domain boundary identifier. Each domain has its own key lineage.
pub type DomainId = i64;

/// Identifier of an externally supplied base cipher key.
pub type BaseCipherId = u64;

/// Random 64-bit salt bound into a key derivation.
pub type CipherSalt = u64;

/// Authentication-token generation mode persisted in the header flags.
///
/// `Single` emits one combined token over ciphertext and header; cheap to
/// produce and verify, but verification requires reading the full payload.
/// `Multi` emits separate tokens for the ciphertext and the header, so a
/// reader can check header integrity before fetching a large payload
/// (backup files).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthTokenMode {
    /// No integrity protection.
    None = 0,
    /// One combined token over ciphertext and header.
    Single = 1,
    /// Separate ciphertext and header tokens.
    Multi = 2,
}

impl AuthTokenMode {
    /// Decode a header flag byte. Returns `None` for unknown values.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(AuthTokenMode::None),
            1 => Some(AuthTokenMode::Single),
            2 => Some(AuthTokenMode::Multi),
            _ => None,
        }
    }

    /// The header flag byte for this mode.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}
