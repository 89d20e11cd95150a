//! Authenticated AES-256-CTR block encryption.
//!
//! `BlockEncryptor::encrypt` produces a length-preserving ciphertext plus
//! a populated `EncryptHeader`; `BlockDecryptor::decrypt` verifies the
//! header and token(s) before reproducing the plaintext. Token layout per
//! mode:
//!
//! - single: one token over `ciphertext || header` (token slot zeroed),
//!   stored in the ciphertext-token slot.
//! - multi: a ciphertext token over the ciphertext alone, then a header
//!   token over the fully populated header with its own slot zeroed. The
//!   header token can be checked without reading the payload.
//!
//! All token comparisons are constant-time over the 16-byte length.

use std::sync::Arc;
use std::time::Duration;

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::digest::compute_auth_token;
use crate::error::CryptoError;
use crate::header::{
    EncryptHeader, HeaderCipherDetails, TextCipherDetails, ENCRYPT_HEADER_VERSION,
    ENCRYPT_MODE_AES_256_CTR, HEADER_AUTH_TOKEN_OFFSET, TEXT_AUTH_TOKEN_OFFSET,
};
use crate::key::CipherKey;
use crate::ratelimit::LogSuppressor;
use crate::types::{AuthTokenMode, AES_256_IV_LENGTH, AUTH_TOKEN_SIZE};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

static BACKEND_LOG: LogSuppressor = LogSuppressor::new(Duration::from_secs(60));

fn backend_error(detail: String) -> CryptoError {
    if BACKEND_LOG.should_log() {
        warn!(detail = %detail, "AES-CTR backend failure");
    }
    CryptoError::Backend(detail)
}

/// Generate a random initialization vector.
pub fn generate_iv() -> Result<[u8; AES_256_IV_LENGTH], CryptoError> {
    let mut iv = [0u8; AES_256_IV_LENGTH];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(iv)
}

fn apply_keystream(
    key: &CipherKey,
    iv: &[u8; AES_256_IV_LENGTH],
    buffer: &mut [u8],
) -> Result<(), CryptoError> {
    let mut cipher = Aes256Ctr::new_from_slices(key.derived_cipher(), iv)
        .map_err(|e| backend_error(format!("cipher setup failed: {e}")))?;
    cipher
        .try_apply_keystream(buffer)
        .map_err(|e| backend_error(format!("keystream failed: {e}")))
}

fn auth_tokens_equal(a: &[u8; AUTH_TOKEN_SIZE], b: &[u8; AUTH_TOKEN_SIZE]) -> bool {
    a.ct_eq(b).into()
}

/// One-shot block encryption for a single request.
///
/// Instances are cheap and are not shared across threads; each request
/// constructs its own.
pub struct BlockEncryptor {
    text_key: Arc<CipherKey>,
    header_key: Arc<CipherKey>,
    iv: [u8; AES_256_IV_LENGTH],
    mode: AuthTokenMode,
}

impl BlockEncryptor {
    pub fn new(
        text_key: Arc<CipherKey>,
        header_key: Arc<CipherKey>,
        iv: &[u8; AES_256_IV_LENGTH],
        mode: AuthTokenMode,
    ) -> Self {
        Self {
            text_key,
            header_key,
            iv: *iv,
            mode,
        }
    }

    /// Encrypt `plaintext` and emit the header describing the result.
    ///
    /// CTR is length-preserving: the ciphertext is exactly as long as the
    /// plaintext. On failure nothing is returned to the caller.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, EncryptHeader), CryptoError> {
        let mut ciphertext = plaintext.to_vec();
        apply_keystream(&self.text_key, &self.iv, &mut ciphertext)?;

        let mut header = EncryptHeader {
            header_version: ENCRYPT_HEADER_VERSION,
            encrypt_mode: ENCRYPT_MODE_AES_256_CTR,
            auth_token_mode: self.mode,
            reserved: [0u8; 4],
            text: TextCipherDetails {
                domain_id: self.text_key.domain_id(),
                base_cipher_id: self.text_key.base_cipher_id(),
                salt: self.text_key.salt(),
                iv: self.iv,
            },
            header: HeaderCipherDetails {
                domain_id: self.header_key.domain_id(),
                base_cipher_id: self.header_key.base_cipher_id(),
                salt: self.header_key.salt(),
            },
            text_auth_token: [0u8; AUTH_TOKEN_SIZE],
            header_auth_token: [0u8; AUTH_TOKEN_SIZE],
        };

        match self.mode {
            AuthTokenMode::None => {}
            AuthTokenMode::Single => {
                // Token region is still zero here, as it must be for the
                // digest input.
                let packed = header.pack();
                header.text_auth_token = compute_auth_token(
                    &[&ciphertext, &packed],
                    self.header_key.derived_cipher(),
                )?;
            }
            AuthTokenMode::Multi => {
                header.text_auth_token =
                    compute_auth_token(&[&ciphertext], self.header_key.derived_cipher())?;
                // The header token covers the populated header, including
                // the ciphertext token, with only its own slot zeroed.
                let packed = header.pack();
                header.header_auth_token =
                    compute_auth_token(&[&packed], self.header_key.derived_cipher())?;
            }
        }

        Ok((ciphertext, header))
    }
}

/// One-shot block decryption for a single request.
pub struct BlockDecryptor {
    text_key: Arc<CipherKey>,
    header_key: Arc<CipherKey>,
    iv: [u8; AES_256_IV_LENGTH],
    header_auth_checked: bool,
}

impl BlockDecryptor {
    pub fn new(
        text_key: Arc<CipherKey>,
        header_key: Arc<CipherKey>,
        iv: &[u8; AES_256_IV_LENGTH],
    ) -> Self {
        Self {
            text_key,
            header_key,
            iv: *iv,
            header_auth_checked: false,
        }
    }

    /// Verify the header auth token without reading the payload.
    ///
    /// Only meaningful in multi-token mode; a no-op otherwise. The result
    /// is remembered so a following `decrypt` does not repeat the work.
    pub fn verify_header(&mut self, header: &EncryptHeader) -> Result<(), CryptoError> {
        if header.auth_token_mode != AuthTokenMode::Multi || self.header_auth_checked {
            return Ok(());
        }
        let mut packed = header.pack();
        packed[HEADER_AUTH_TOKEN_OFFSET..].fill(0);
        let expected = compute_auth_token(&[&packed], self.header_key.derived_cipher())?;
        if !auth_tokens_equal(&expected, &header.header_auth_token) {
            return Err(CryptoError::AuthTokenMismatch);
        }
        self.header_auth_checked = true;
        Ok(())
    }

    /// Verify auth token(s) and decrypt `ciphertext`.
    ///
    /// The IV is taken from the header; the constructor IV is redundant
    /// and must agree with it. Both supplied keys must match the identity
    /// triples recorded in the header.
    pub fn decrypt(
        &mut self,
        ciphertext: &[u8],
        header: &EncryptHeader,
    ) -> Result<Vec<u8>, CryptoError> {
        match header.auth_token_mode {
            AuthTokenMode::None => {}
            AuthTokenMode::Single => {
                let mut packed = header.pack();
                packed[TEXT_AUTH_TOKEN_OFFSET..HEADER_AUTH_TOKEN_OFFSET].fill(0);
                let expected = compute_auth_token(
                    &[ciphertext, &packed],
                    self.header_key.derived_cipher(),
                )?;
                if !auth_tokens_equal(&expected, &header.text_auth_token) {
                    return Err(CryptoError::AuthTokenMismatch);
                }
            }
            AuthTokenMode::Multi => {
                self.verify_header(header)?;
                let expected =
                    compute_auth_token(&[ciphertext], self.header_key.derived_cipher())?;
                if !auth_tokens_equal(&expected, &header.text_auth_token) {
                    return Err(CryptoError::AuthTokenMismatch);
                }
            }
        }

        if header.text.iv != self.iv {
            return Err(CryptoError::HeaderMalformed(
                "initialization vector does not match header".to_string(),
            ));
        }
        if self.text_key.domain_id() != header.text.domain_id
            || self.text_key.base_cipher_id() != header.text.base_cipher_id
            || self.text_key.salt() != header.text.salt
        {
            return Err(CryptoError::KeyMismatch {
                domain_id: header.text.domain_id,
                base_cipher_id: header.text.base_cipher_id,
                salt: header.text.salt,
            });
        }
        if self.header_key.domain_id() != header.header.domain_id
            || self.header_key.base_cipher_id() != header.header.base_cipher_id
            || self.header_key.salt() != header.header.salt
        {
            return Err(CryptoError::KeyMismatch {
                domain_id: header.header.domain_id,
                base_cipher_id: header.header.base_cipher_id,
                salt: header.header.salt,
            });
        }

        let mut plaintext = ciphertext.to_vec();
        apply_keystream(&self.text_key, &header.text.iv, &mut plaintext)?;
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(domain_id: i64, base_cipher_id: u64, salt: u64) -> Arc<CipherKey> {
        Arc::new(
            CipherKey::with_salt(domain_id, base_cipher_id, b"0123456789abcdef", salt).unwrap(),
        )
    }

    fn encryptor(mode: AuthTokenMode) -> BlockEncryptor {
        BlockEncryptor::new(test_key(1, 10, 100), test_key(1, 20, 200), &[0u8; 16], mode)
    }

    fn decryptor() -> BlockDecryptor {
        BlockDecryptor::new(test_key(1, 10, 100), test_key(1, 20, 200), &[0u8; 16])
    }

    #[test]
    fn ciphertext_is_length_preserving() {
        for len in [0usize, 1, 11, 255, 4096] {
            let plaintext = vec![0x42u8; len];
            let (ciphertext, _) = encryptor(AuthTokenMode::Single).encrypt(&plaintext).unwrap();
            assert_eq!(ciphertext.len(), len);
        }
    }

    #[test]
    fn round_trip_all_modes() {
        for mode in [AuthTokenMode::None, AuthTokenMode::Single, AuthTokenMode::Multi] {
            let (ciphertext, header) = encryptor(mode).encrypt(b"hello world").unwrap();
            let plaintext = decryptor().decrypt(&ciphertext, &header).unwrap();
            assert_eq!(plaintext, b"hello world");
        }
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        let (ciphertext, _) = encryptor(AuthTokenMode::Single).encrypt(b"hello world").unwrap();
        assert_ne!(ciphertext, b"hello world");
    }

    #[test]
    fn same_iv_same_key_is_deterministic() {
        let (a, _) = encryptor(AuthTokenMode::Single).encrypt(b"payload").unwrap();
        let (b, _) = encryptor(AuthTokenMode::Single).encrypt(b"payload").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_iv_different_ciphertext() {
        let text_key = test_key(1, 10, 100);
        let header_key = test_key(1, 20, 200);
        let enc_a = BlockEncryptor::new(
            text_key.clone(),
            header_key.clone(),
            &[0u8; 16],
            AuthTokenMode::None,
        );
        let mut iv = [0u8; 16];
        iv[15] = 1;
        let enc_b = BlockEncryptor::new(text_key, header_key, &iv, AuthTokenMode::None);
        assert_ne!(
            enc_a.encrypt(b"payload").unwrap().0,
            enc_b.encrypt(b"payload").unwrap().0
        );
    }

    #[test]
    fn single_mode_leaves_header_token_slot_zero() {
        let (_, header) = encryptor(AuthTokenMode::Single).encrypt(b"payload").unwrap();
        assert_eq!(header.header_auth_token, [0u8; AUTH_TOKEN_SIZE]);
        assert_ne!(header.text_auth_token, [0u8; AUTH_TOKEN_SIZE]);
    }

    #[test]
    fn none_mode_zeroes_token_region() {
        let (_, header) = encryptor(AuthTokenMode::None).encrypt(b"payload").unwrap();
        assert_eq!(header.text_auth_token, [0u8; AUTH_TOKEN_SIZE]);
        assert_eq!(header.header_auth_token, [0u8; AUTH_TOKEN_SIZE]);
    }

    #[test]
    fn multi_mode_populates_both_tokens() {
        let (_, header) = encryptor(AuthTokenMode::Multi).encrypt(b"payload").unwrap();
        assert_ne!(header.text_auth_token, [0u8; AUTH_TOKEN_SIZE]);
        assert_ne!(header.header_auth_token, [0u8; AUTH_TOKEN_SIZE]);
    }

    #[test]
    fn tampered_ciphertext_fails_single_mode() {
        let (mut ciphertext, header) =
            encryptor(AuthTokenMode::Single).encrypt(b"hello world").unwrap();
        ciphertext[0] ^= 0x01;
        let err = decryptor().decrypt(&ciphertext, &header).unwrap_err();
        assert!(matches!(err, CryptoError::AuthTokenMismatch));
    }

    #[test]
    fn tampered_ciphertext_fails_multi_mode() {
        let (mut ciphertext, header) =
            encryptor(AuthTokenMode::Multi).encrypt(b"hello world").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x80;
        let err = decryptor().decrypt(&ciphertext, &header).unwrap_err();
        assert!(matches!(err, CryptoError::AuthTokenMismatch));
    }

    #[test]
    fn tampered_ciphertext_passes_none_mode_with_garbage_output() {
        let (mut ciphertext, header) =
            encryptor(AuthTokenMode::None).encrypt(b"hello world").unwrap();
        ciphertext[0] ^= 0x01;
        let plaintext = decryptor().decrypt(&ciphertext, &header).unwrap();
        assert_ne!(plaintext, b"hello world");
    }

    #[test]
    fn verify_header_passes_untampered_multi() {
        let (_, header) = encryptor(AuthTokenMode::Multi).encrypt(b"payload").unwrap();
        decryptor().verify_header(&header).unwrap();
    }

    #[test]
    fn verify_header_detects_identity_tampering() {
        let (_, header) = encryptor(AuthTokenMode::Multi).encrypt(b"payload").unwrap();
        let mut tampered = header.clone();
        tampered.text.domain_id = 2;
        let err = decryptor().verify_header(&tampered).unwrap_err();
        assert!(matches!(err, CryptoError::AuthTokenMismatch));
    }

    #[test]
    fn verify_header_detects_reserved_byte_tampering() {
        let (_, header) = encryptor(AuthTokenMode::Multi).encrypt(b"payload").unwrap();
        let mut packed = header.pack();
        packed[5] ^= 0xff;
        let tampered = EncryptHeader::unpack(&packed).unwrap();
        assert!(decryptor().verify_header(&tampered).is_err());
    }

    #[test]
    fn verify_header_is_a_noop_for_single_and_none() {
        for mode in [AuthTokenMode::None, AuthTokenMode::Single] {
            let (_, header) = encryptor(mode).encrypt(b"payload").unwrap();
            decryptor().verify_header(&header).unwrap();
        }
    }

    #[test]
    fn verify_header_result_is_memoized() {
        let (ciphertext, header) = encryptor(AuthTokenMode::Multi).encrypt(b"payload").unwrap();
        let mut dec = decryptor();
        dec.verify_header(&header).unwrap();
        let plaintext = dec.decrypt(&ciphertext, &header).unwrap();
        assert_eq!(plaintext, b"payload");
    }

    #[test]
    fn tampered_single_token_fails() {
        let (ciphertext, mut header) =
            encryptor(AuthTokenMode::Single).encrypt(b"payload").unwrap();
        header.text_auth_token[3] ^= 0x10;
        let err = decryptor().decrypt(&ciphertext, &header).unwrap_err();
        assert!(matches!(err, CryptoError::AuthTokenMismatch));
    }

    #[test]
    fn wrong_constructor_iv_fails() {
        let (ciphertext, header) = encryptor(AuthTokenMode::Single).encrypt(b"payload").unwrap();
        let mut iv = [0u8; 16];
        iv[0] = 9;
        let mut dec = BlockDecryptor::new(test_key(1, 10, 100), test_key(1, 20, 200), &iv);
        let err = dec.decrypt(&ciphertext, &header).unwrap_err();
        assert!(matches!(err, CryptoError::HeaderMalformed(_)));
    }

    #[test]
    fn wrong_text_key_identity_fails() {
        let (ciphertext, header) = encryptor(AuthTokenMode::None).encrypt(b"payload").unwrap();
        let mut dec =
            BlockDecryptor::new(test_key(1, 11, 100), test_key(1, 20, 200), &[0u8; 16]);
        let err = dec.decrypt(&ciphertext, &header).unwrap_err();
        assert!(matches!(err, CryptoError::KeyMismatch { .. }));
    }

    #[test]
    fn wrong_header_key_identity_fails() {
        let (ciphertext, header) = encryptor(AuthTokenMode::None).encrypt(b"payload").unwrap();
        let mut dec =
            BlockDecryptor::new(test_key(1, 10, 100), test_key(2, 20, 200), &[0u8; 16]);
        let err = dec.decrypt(&ciphertext, &header).unwrap_err();
        assert!(matches!(err, CryptoError::KeyMismatch { .. }));
    }

    #[test]
    fn generated_ivs_are_distinct() {
        let a = generate_iv().unwrap();
        let b = generate_iv().unwrap();
        assert_ne!(a, b);
    }
}
