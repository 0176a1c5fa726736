//! Cryptographic primitives: Ed25519, SHA-256, base64 variants, SPKI DER.
//!
//! Public keys travel in JSON as standard-padded base64 of their 44-byte
//! SPKI DER encoding; signatures as standard-padded base64 of the 64-byte
//! Ed25519 signature. Hash-derived identifiers use base64url without
//! padding. Both base64 alphabets are deliberate and not interchangeable.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ed25519_dalek::pkcs8::EncodePublicKey;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use spki::der::Decode;
use spki::SubjectPublicKeyInfoRef;
use std::fmt;

use crate::error::CryptoError;

const OID_ED25519: spki::ObjectIdentifier = spki::ObjectIdentifier::new_unwrap("1.3.101.112");

/// SHA-256 of the given bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Standard-padded base64 (key and signature material in JSON).
pub fn b64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode standard-padded base64.
pub fn b64_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(s)
        .map_err(|e| CryptoError::InvalidBase64(e.to_string()))
}

/// Base64url without padding (hash-derived identifiers, invite links).
pub fn b64url_nopad(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode base64url without padding.
pub fn b64url_nopad_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| CryptoError::InvalidBase64(e.to_string()))
}

/// Check that DER bytes are a SubjectPublicKeyInfo with the Ed25519 OID.
pub fn is_ed25519_spki(spki_der: &[u8]) -> bool {
    let Ok(info) = SubjectPublicKeyInfoRef::from_der(spki_der) else {
        return false;
    };
    info.algorithm.oid == OID_ED25519
}

/// Parse an Ed25519 verifying key out of SPKI DER bytes.
pub fn verifying_key_from_spki_der(spki_der: &[u8]) -> Result<VerifyingKey, CryptoError> {
    let info = SubjectPublicKeyInfoRef::from_der(spki_der)
        .map_err(|e| CryptoError::InvalidSpki(e.to_string()))?;

    if info.algorithm.oid != OID_ED25519 {
        return Err(CryptoError::InvalidSpki("algorithm OID is not Ed25519".into()));
    }

    let pk_bytes = info
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| CryptoError::InvalidSpki("subject_public_key missing".into()))?;

    let pk: [u8; 32] = pk_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidSpki(format!("key must be 32 bytes (got {})", pk_bytes.len())))?;
    VerifyingKey::from_bytes(&pk).map_err(|e| CryptoError::InvalidSpki(e.to_string()))
}

/// Verify a base64 signature over a message under a base64 SPKI public key,
/// exactly as both appear in wire objects.
pub fn verify_b64(pub_spki_b64: &str, message: &[u8], sig_b64: &str) -> Result<(), CryptoError> {
    let spki_der = b64_decode(pub_spki_b64)?;
    let key = verifying_key_from_spki_der(&spki_der)?;

    let sig_bytes = b64_decode(sig_b64)?;
    let sig_arr: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSignatureBytes)?;
    let sig = Signature::from_bytes(&sig_arr);

    key.verify(message, &sig)
        .map_err(|_| CryptoError::SignatureFailed)
}

/// An Ed25519 keypair used for Principal, Device, and Space Root keys.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from a 32-byte seed (tests and key import).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// SPKI DER encoding of the public key (44 bytes for Ed25519).
    pub fn public_spki_der(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_public_key_der()
            .expect("Ed25519 SPKI encoding cannot fail")
            .as_bytes()
            .to_vec()
    }

    /// Standard-padded base64 of the SPKI DER, as transported in JSON.
    pub fn public_spki_b64(&self) -> String {
        b64(&self.public_spki_der())
    }

    /// The `ed25519:`-prefixed identifier derived from this public key.
    pub fn id(&self) -> String {
        crate::ids::id_from_spki_der(&self.public_spki_der())
    }

    /// Sign a message, returning the standard-padded base64 signature.
    pub fn sign_b64(&self, message: &[u8]) -> String {
        b64(&self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.id())
    }
}
