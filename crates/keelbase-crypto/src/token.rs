//! ECDSA P-256 signing and verification for inter-process auth tokens.
//!
//! Tokens travel out-of-band from the block cipher but share its trust
//! boundary. The signed payload is the token's wire serialization: a
//! length-prefixed version tag followed by the CBOR encoding of the
//! token fields. Keys are exchanged as DER (PKCS#8 private, SPKI public).

use std::net::IpAddr;
use std::time::Duration;

use ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::OsRng;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CryptoError;
use crate::ratelimit::LogSuppressor;

/// Version tag carried ahead of the CBOR token payload.
const TOKEN_WIRE_VERSION: u64 = 1;

static SIGN_FAILURE_LOG: LogSuppressor = LogSuppressor::new(Duration::from_secs(60));
static VERIFY_MISMATCH_LOG: LogSuppressor = LogSuppressor::new(Duration::from_secs(30));

/// An authorization token granting access to a set of tenants until an
/// expiry time, optionally pinned to a client address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Expiry as seconds since the epoch.
    pub expires_at: f64,
    /// Client address the token is pinned to, when any.
    pub ip_address: Option<IpAddr>,
    /// Tenant names the token grants access to.
    pub tenants: Vec<Vec<u8>>,
}

/// A serialized token together with its signature and the name of the
/// key that produced it. Consumers select the verifying key by
/// `key_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedAuthToken {
    /// Token payload exactly as signed.
    pub token: Vec<u8>,
    /// DER-encoded ECDSA-SHA256 signature over `token`.
    pub signature: Vec<u8>,
    /// Identifier of the signing key.
    pub key_name: Vec<u8>,
}

/// Serialize a token to its signable wire form.
///
/// Layout: `[tag length: u32 LE][version tag: u64 LE][CBOR token]`.
pub fn serialize_token(token: &AuthToken) -> Result<Vec<u8>, CryptoError> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&(std::mem::size_of::<u64>() as u32).to_le_bytes());
    buf.extend_from_slice(&TOKEN_WIRE_VERSION.to_le_bytes());
    ciborium::into_writer(token, &mut buf)
        .map_err(|e| CryptoError::TokenMalformed(format!("encode failed: {e}")))?;
    Ok(buf)
}

/// Decode a token payload produced by `serialize_token`.
pub fn deserialize_token(bytes: &[u8]) -> Result<AuthToken, CryptoError> {
    if bytes.len() < 12 {
        return Err(CryptoError::TokenMalformed(format!(
            "payload too short: {} bytes",
            bytes.len()
        )));
    }
    let tag_len = u32::from_le_bytes(bytes[..4].try_into().expect("slice is 4 bytes")) as usize;
    if tag_len != std::mem::size_of::<u64>() {
        return Err(CryptoError::TokenMalformed(format!(
            "unexpected version tag length {tag_len}"
        )));
    }
    let version = u64::from_le_bytes(bytes[4..12].try_into().expect("slice is 8 bytes"));
    if version != TOKEN_WIRE_VERSION {
        return Err(CryptoError::TokenMalformed(format!(
            "unsupported token wire version {version}"
        )));
    }
    ciborium::from_reader(&bytes[12..])
        .map_err(|e| CryptoError::TokenMalformed(format!("decode failed: {e}")))
}

/// Generate a fresh ECDSA P-256 keypair.
///
/// Returns `(private_der, public_der)`: PKCS#8 and SPKI respectively.
pub fn generate_keypair() -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let signing_key = SigningKey::random(&mut OsRng);
    let private_der = signing_key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::BadKey(format!("private key export: {e}")))?
        .as_bytes()
        .to_vec();
    let public_der = signing_key
        .verifying_key()
        .to_public_key_der()
        .map_err(|e| CryptoError::BadKey(format!("public key export: {e}")))?
        .into_vec();
    Ok((private_der, public_der))
}

/// Serialize and sign `token` with the given private key.
pub fn sign_token(
    token: &AuthToken,
    key_name: &[u8],
    private_key_der: &[u8],
) -> Result<SignedAuthToken, CryptoError> {
    let payload = serialize_token(token)?;
    let signing_key = SigningKey::from_pkcs8_der(private_key_der).map_err(|e| {
        if SIGN_FAILURE_LOG.should_log() {
            warn!(detail = %e, "auth token signing key rejected");
        }
        CryptoError::BadKey(format!("signing key parse: {e}"))
    })?;
    let signature: Signature = signing_key.try_sign(&payload).map_err(|e| {
        if SIGN_FAILURE_LOG.should_log() {
            warn!(detail = %e, "auth token signing failed");
        }
        CryptoError::Backend(format!("ECDSA signing failed: {e}"))
    })?;
    Ok(SignedAuthToken {
        token: payload,
        signature: signature.to_der().as_bytes().to_vec(),
        key_name: key_name.to_vec(),
    })
}

/// Verify a signed token against a public key.
///
/// A mismatched signature is an expected condition and yields
/// `Ok(false)`; only an unparseable key is an error.
pub fn verify_token(
    signed: &SignedAuthToken,
    public_key_der: &[u8],
) -> Result<bool, CryptoError> {
    let verifying_key = VerifyingKey::from_public_key_der(public_key_der)
        .map_err(|e| CryptoError::BadKey(format!("verification key parse: {e}")))?;
    let signature = match Signature::from_der(&signed.signature) {
        Ok(signature) => signature,
        Err(e) => {
            if VERIFY_MISMATCH_LOG.should_log() {
                info!(detail = %e, "auth token signature undecodable");
            }
            return Ok(false);
        }
    };
    if verifying_key.verify(&signed.token, &signature).is_ok() {
        Ok(true)
    } else {
        if VERIFY_MISMATCH_LOG.should_log() {
            info!("auth token signature mismatch");
        }
        Ok(false)
    }
}
