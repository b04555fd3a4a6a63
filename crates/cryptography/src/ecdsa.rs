// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! P-256 (secp256r1) keys and fixed-size 64-byte signatures.

use crate::{CryptoError, CryptoResult};
use onyx_io::{BinaryWriter, CodecError, CodecResult, MemoryReader, Serializable};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::{CryptoRng, RngCore};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Compressed SEC1 public key length.
pub const PUBLIC_KEY_SIZE: usize = 33;
/// Uncompressed SEC1 public key length, accepted on input.
pub const UNCOMPRESSED_PUBLIC_KEY_SIZE: usize = 65;
/// Raw `r || s` signature length.
pub const SIGNATURE_SIZE: usize = 64;
pub const PRIVATE_KEY_SIZE: usize = 32;

/// A P-256 public key.
///
/// Equality, ordering and hashing use the 33-byte compressed encoding, which
/// is also the canonical committee sort order.
#[derive(Clone)]
pub struct PublicKey {
    encoded: [u8; PUBLIC_KEY_SIZE],
    key: VerifyingKey,
}

impl PublicKey {
    /// Parses a compressed or uncompressed SEC1 point.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self::from_verifying_key(key))
    }

    /// Parses a hex encoded SEC1 point.
    pub fn from_hex(text: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(text.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    fn from_verifying_key(key: VerifyingKey) -> Self {
        let point = key.to_encoded_point(true);
        let mut encoded = [0u8; PUBLIC_KEY_SIZE];
        encoded.copy_from_slice(point.as_bytes());
        Self { encoded, key }
    }

    /// Compressed SEC1 encoding.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.encoded
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encoded)
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for PublicKey {}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encoded.cmp(&other.encoded)
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Public keys travel as length-prefixed compressed points.
impl Serializable for PublicKey {
    fn size(&self) -> usize {
        1 + PUBLIC_KEY_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_var_bytes(&self.encoded);
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        let bytes = reader.read_var_memory(UNCOMPRESSED_PUBLIC_KEY_SIZE)?;
        Self::from_bytes(bytes).map_err(|e| CodecError::invalid_data(e.to_string()))
    }
}

/// A 64-byte `r || s` ECDSA signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    pub const fn new(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let array: [u8; SIGNATURE_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignature(format!("expected 64 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
    }
}

/// Signatures embedded in consensus messages are fixed 64-byte fields.
impl Serializable for Signature {
    fn size(&self) -> usize {
        SIGNATURE_SIZE
    }

    fn serialize(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(&self.0);
    }

    fn deserialize(reader: &mut MemoryReader) -> CodecResult<Self> {
        Ok(Self(reader.read_array()?))
    }
}

/// A signing key together with its public key.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    pub fn from_private_key(private_key: &[u8]) -> CryptoResult<Self> {
        if private_key.len() != PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidPrivateKey(format!(
                "expected {PRIVATE_KEY_SIZE} bytes, got {}",
                private_key.len()
            )));
        }
        let signing_key = SigningKey::from_slice(private_key)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        Self::from_signing_key(SigningKey::random(rng))
    }

    /// Generates a key pair from the operating system RNG.
    pub fn random() -> Self {
        Self::generate(&mut rand::rngs::OsRng)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey::from_verifying_key(signing_key.verifying_key().clone());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Signs `message` (SHA-256 is applied internally, RFC 6979 nonces).
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Signature> {
        let signature: P256Signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes.copy_from_slice(&signature.to_bytes());
        Ok(Signature(bytes))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Signs `message` with `key`.
pub fn sign(key: &KeyPair, message: &[u8]) -> CryptoResult<Signature> {
    key.sign(message)
}

/// Verifies `signature` over `message` against `public_key`.
///
/// Malformed signatures (e.g. zero scalars) verify as `false`.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    match P256Signature::from_slice(signature.as_bytes()) {
        Ok(sig) => public_key.verifying_key().verify(message, &sig).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onyx_io::SerializableExt;

    fn key(seed: u8) -> KeyPair {
        KeyPair::from_private_key(&[seed; 32]).unwrap()
    }

    #[test]
    fn sign_and_verify() {
        let pair = key(1);
        let sig = pair.sign(b"block hash").unwrap();
        assert!(verify(pair.public_key(), b"block hash", &sig));
        assert!(!verify(pair.public_key(), b"other hash", &sig));
        assert!(!verify(key(2).public_key(), b"block hash", &sig));
    }

    #[test]
    fn signing_is_deterministic() {
        let pair = key(3);
        assert_eq!(pair.sign(b"m").unwrap(), sign(&pair, b"m").unwrap());
    }

    #[test]
    fn zero_signature_rejected() {
        let pair = key(4);
        assert!(!verify(pair.public_key(), b"m", &Signature::new([0u8; 64])));
    }

    #[test]
    fn public_key_normalises_to_compressed() {
        let pair = key(5);
        let uncompressed = pair
            .public_key()
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        assert_eq!(uncompressed.len(), UNCOMPRESSED_PUBLIC_KEY_SIZE);
        let parsed = PublicKey::from_bytes(&uncompressed).unwrap();
        assert_eq!(&parsed, pair.public_key());
        assert_eq!(PublicKey::from_hex(&parsed.to_hex()).unwrap(), parsed);
    }

    #[test]
    fn public_key_codec() {
        let pair = key(6);
        let bytes = pair.public_key().to_array();
        assert_eq!(bytes.len(), 34);
        assert_eq!(bytes[0], 33);
        assert_eq!(&PublicKey::from_array(&bytes).unwrap(), pair.public_key());

        let mut garbage = bytes.clone();
        garbage[2] ^= 0xFF;
        garbage[1] = 0x05;
        assert!(PublicKey::from_array(&garbage).is_err());
    }

    #[test]
    fn invalid_private_key_rejected() {
        assert!(KeyPair::from_private_key(&[0u8; 32]).is_err());
        assert!(KeyPair::from_private_key(&[1u8; 31]).is_err());
    }

    #[test]
    fn signature_from_slice_checks_length() {
        assert!(Signature::from_slice(&[0u8; 63]).is_err());
        assert!(Signature::from_slice(&[0u8; 64]).is_ok());
    }
}
