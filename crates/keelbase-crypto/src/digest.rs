//! HMAC-SHA-256 one-shot and streaming digests (RFC 2104 with SHA-256).

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::CryptoError;
use crate::ratelimit::LogSuppressor;
use crate::types::AUTH_TOKEN_SIZE;

type HmacSha256Mac = Hmac<Sha256>;

/// HMAC-SHA-256 digest length in bytes.
pub const HMAC_SHA256_DIGEST_LENGTH: usize = 32;

static BACKEND_LOG: LogSuppressor = LogSuppressor::new(Duration::from_secs(60));

fn backend_error(detail: String) -> CryptoError {
    if BACKEND_LOG.should_log() {
        warn!(detail = %detail, "HMAC backend failure");
    }
    CryptoError::Backend(detail)
}

/// One-shot HMAC-SHA-256 over `data` keyed with `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; HMAC_SHA256_DIGEST_LENGTH], CryptoError> {
    let mut mac = HmacSha256Mac::new_from_slice(key)
        .map_err(|e| backend_error(format!("HMAC key setup failed: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Streaming keyed digest.
///
/// Holds the keyed initial state so repeated digests under the same key
/// reset without re-running the key schedule.
pub struct HmacSha256 {
    template: HmacSha256Mac,
    state: HmacSha256Mac,
}

impl HmacSha256 {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let template = HmacSha256Mac::new_from_slice(key)
            .map_err(|e| backend_error(format!("HMAC key setup failed: {e}")))?;
        let state = template.clone();
        Ok(Self { template, state })
    }

    /// Absorb more message bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Produce the digest and reset to the keyed initial state.
    pub fn finalize(&mut self) -> [u8; HMAC_SHA256_DIGEST_LENGTH] {
        let mac = std::mem::replace(&mut self.state, self.template.clone());
        mac.finalize().into_bytes().into()
    }

    /// Discard any absorbed input.
    pub fn reset(&mut self) {
        self.state = self.template.clone();
    }
}

/// Truncated authentication token over a sequence of payload slices.
///
/// The slices are digested in order as one message; the token is the
/// leading `AUTH_TOKEN_SIZE` bytes of the HMAC-SHA-256 output.
pub fn compute_auth_token(
    parts: &[&[u8]],
    key: &[u8],
) -> Result<[u8; AUTH_TOKEN_SIZE], CryptoError> {
    let mut mac = HmacSha256Mac::new_from_slice(key)
        .map_err(|e| backend_error(format!("HMAC key setup failed: {e}")))?;
    for part in parts {
        mac.update(part);
    }
    let digest = mac.finalize().into_bytes();
    let mut token = [0u8; AUTH_TOKEN_SIZE];
    token.copy_from_slice(&digest[..AUTH_TOKEN_SIZE]);
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc4231_test_case_1() {
        // RFC 4231 test case 1 (HMAC-SHA-256)
        let key = [0x0bu8; 20];
        let expected =
            hex::decode("b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7")
                .unwrap();
        let digest = hmac_sha256(&key, b"Hi There").unwrap();
        assert_eq!(digest.to_vec(), expected);
    }

    #[test]
    fn rfc4231_test_case_2() {
        // RFC 4231 test case 2: short key, longer message
        let expected =
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .unwrap();
        let digest = hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(digest.to_vec(), expected);
    }

    #[test]
    fn different_keys_different_digests() {
        let a = hmac_sha256(b"key-a", b"payload").unwrap();
        let b = hmac_sha256(b"key-b", b"payload").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_data_different_digests() {
        let a = hmac_sha256(b"key", b"payload-a").unwrap();
        let b = hmac_sha256(b"key", b"payload-b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let mut ctx = HmacSha256::new(b"stream-key").unwrap();
        ctx.update(b"Hi ");
        ctx.update(b"There");
        let streamed = ctx.finalize();
        let one_shot = hmac_sha256(b"stream-key", b"Hi There").unwrap();
        assert_eq!(streamed, one_shot);
    }

    #[test]
    fn finalize_resets_keyed_state() {
        let mut ctx = HmacSha256::new(b"stream-key").unwrap();
        ctx.update(b"first message");
        let first = ctx.finalize();
        ctx.update(b"first message");
        let second = ctx.finalize();
        assert_eq!(first, second);
    }

    #[test]
    fn reset_discards_absorbed_input() {
        let mut ctx = HmacSha256::new(b"stream-key").unwrap();
        ctx.update(b"garbage");
        ctx.reset();
        ctx.update(b"payload");
        assert_eq!(ctx.finalize(), hmac_sha256(b"stream-key", b"payload").unwrap());
    }

    #[test]
    fn auth_token_is_digest_prefix() {
        let token = compute_auth_token(&[b"Hi ", b"There"], &[0x0bu8; 20]).unwrap();
        let digest = hmac_sha256(&[0x0bu8; 20], b"Hi There").unwrap();
        assert_eq!(token, digest[..AUTH_TOKEN_SIZE]);
    }

    #[test]
    fn auth_token_concatenates_parts() {
        let joined = compute_auth_token(&[b"abc", b"def"], b"key").unwrap();
        let single = compute_auth_token(&[b"abcdef"], b"key").unwrap();
        assert_eq!(joined, single);
    }
}
