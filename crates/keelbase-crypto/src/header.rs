//! The persisted encryption header.
//!
//! Wire format (104 bytes, little-endian, packed):
//! ```text
//! [0]      size, always 104. ALWAYS THE FIRST BYTE
//! [1]      header_version (currently 1)
//! [2]      encrypt_mode (AES-256-CTR = 1)
//! [3]      auth_token_mode (0 = none, 1 = single, 2 = multi)
//! [4..8]   reserved, written as zero
//! [8..16]  text domain_id (i64)
//! [16..24] text base_cipher_id (u64)
//! [24..32] text salt (u64)
//! [32..48] text IV
//! [48..56] header domain_id (i64)
//! [56..64] header base_cipher_id (u64)
//! [64..72] header salt (u64)
//! [72..88] ciphertext auth token (single token in single mode)
//! [88..104] header auth token (zero in single mode)
//! ```
//!
//! The header is persisted as plaintext next to the encrypted blob; it
//! carries everything a reader needs to reconstruct the cipher keys. The
//! codec is explicit byte-level encode/decode so the layout survives any
//! compiler and architecture.

use crate::error::CryptoError;
use crate::types::{AuthTokenMode, BaseCipherId, CipherSalt, DomainId, AES_256_IV_LENGTH, AUTH_TOKEN_SIZE};

/// Total header size in bytes.
pub const HEADER_SIZE: usize = 104;

/// Current header layout version.
pub const ENCRYPT_HEADER_VERSION: u8 = 1;

/// Encryption mode flag for AES-256-CTR.
pub const ENCRYPT_MODE_AES_256_CTR: u8 = 1;

/// Offset of the ciphertext auth token within the packed header.
pub const TEXT_AUTH_TOKEN_OFFSET: usize = 72;

/// Offset of the header auth token within the packed header.
pub const HEADER_AUTH_TOKEN_OFFSET: usize = 88;

/// Identity and IV of the key that encrypted the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCipherDetails {
    pub domain_id: DomainId,
    pub base_cipher_id: BaseCipherId,
    pub salt: CipherSalt,
    pub iv: [u8; AES_256_IV_LENGTH],
}

/// Identity of the key that authenticates the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCipherDetails {
    pub domain_id: DomainId,
    pub base_cipher_id: BaseCipherId,
    pub salt: CipherSalt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptHeader {
    pub header_version: u8,
    pub encrypt_mode: u8,
    pub auth_token_mode: AuthTokenMode,
    /// Reserved flag bytes. Written as zero, preserved verbatim on read so
    /// they stay covered by the auth tokens.
    pub reserved: [u8; 4],
    pub text: TextCipherDetails,
    pub header: HeaderCipherDetails,
    pub text_auth_token: [u8; AUTH_TOKEN_SIZE],
    pub header_auth_token: [u8; AUTH_TOKEN_SIZE],
}

fn read_u64(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(bytes.try_into().expect("caller slices exactly 8 bytes"))
}

fn read_i64(bytes: &[u8]) -> i64 {
    i64::from_le_bytes(bytes.try_into().expect("caller slices exactly 8 bytes"))
}

impl EncryptHeader {
    /// Encode to the packed wire layout.
    pub fn pack(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = HEADER_SIZE as u8;
        buf[1] = self.header_version;
        buf[2] = self.encrypt_mode;
        buf[3] = self.auth_token_mode.as_byte();
        buf[4..8].copy_from_slice(&self.reserved);
        buf[8..16].copy_from_slice(&self.text.domain_id.to_le_bytes());
        buf[16..24].copy_from_slice(&self.text.base_cipher_id.to_le_bytes());
        buf[24..32].copy_from_slice(&self.text.salt.to_le_bytes());
        buf[32..48].copy_from_slice(&self.text.iv);
        buf[48..56].copy_from_slice(&self.header.domain_id.to_le_bytes());
        buf[56..64].copy_from_slice(&self.header.base_cipher_id.to_le_bytes());
        buf[64..72].copy_from_slice(&self.header.salt.to_le_bytes());
        buf[TEXT_AUTH_TOKEN_OFFSET..HEADER_AUTH_TOKEN_OFFSET]
            .copy_from_slice(&self.text_auth_token);
        buf[HEADER_AUTH_TOKEN_OFFSET..].copy_from_slice(&self.header_auth_token);
        buf
    }

    /// Decode and structurally validate a packed header.
    ///
    /// Unknown `header_version` and `encrypt_mode` values are rejected
    /// outright; the reserved bytes are carried through untouched.
    pub fn unpack(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != HEADER_SIZE {
            return Err(CryptoError::HeaderMalformed(format!(
                "expected {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] as usize != HEADER_SIZE {
            return Err(CryptoError::HeaderMalformed(format!(
                "size byte {} does not match layout size {HEADER_SIZE}",
                bytes[0]
            )));
        }
        if bytes[1] != ENCRYPT_HEADER_VERSION {
            return Err(CryptoError::HeaderMalformed(format!(
                "unsupported header version {}",
                bytes[1]
            )));
        }
        if bytes[2] != ENCRYPT_MODE_AES_256_CTR {
            return Err(CryptoError::HeaderMalformed(format!(
                "unsupported encrypt mode {}",
                bytes[2]
            )));
        }
        let auth_token_mode = AuthTokenMode::from_byte(bytes[3]).ok_or_else(|| {
            CryptoError::HeaderMalformed(format!("unknown auth token mode {}", bytes[3]))
        })?;

        let mut reserved = [0u8; 4];
        reserved.copy_from_slice(&bytes[4..8]);
        let mut iv = [0u8; AES_256_IV_LENGTH];
        iv.copy_from_slice(&bytes[32..48]);
        let mut text_auth_token = [0u8; AUTH_TOKEN_SIZE];
        text_auth_token.copy_from_slice(&bytes[TEXT_AUTH_TOKEN_OFFSET..HEADER_AUTH_TOKEN_OFFSET]);
        let mut header_auth_token = [0u8; AUTH_TOKEN_SIZE];
        header_auth_token.copy_from_slice(&bytes[HEADER_AUTH_TOKEN_OFFSET..]);

        Ok(Self {
            header_version: bytes[1],
            encrypt_mode: bytes[2],
            auth_token_mode,
            reserved,
            text: TextCipherDetails {
                domain_id: read_i64(&bytes[8..16]),
                base_cipher_id: read_u64(&bytes[16..24]),
                salt: read_u64(&bytes[24..32]),
                iv,
            },
            header: HeaderCipherDetails {
                domain_id: read_i64(&bytes[48..56]),
                base_cipher_id: read_u64(&bytes[56..64]),
                salt: read_u64(&bytes[64..72]),
            },
            text_auth_token,
            header_auth_token,
        })
    }
}
