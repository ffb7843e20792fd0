// Copyright (c) 2024 The Botho Foundation

#![deny(unsafe_code)]

//! Secp256k1 key material for wallet custody.
//!
//! This crate provides the key types the keystore holds and signs with:
//! private keys in Wallet Import Format (WIF), compressed public keys with a
//! `BTH` text prefix, and recoverable ECDSA signatures over 32-byte digests.
//!
//! # Examples
//!
//! ```
//! use bth_crypto_secp256k1::PrivateKey;
//!
//! let wif = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";
//! let key = PrivateKey::from_wif(wif).unwrap();
//! assert_eq!(key.to_wif().as_str(), wif);
//!
//! let digest = [7u8; 32];
//! let signature = key.sign_digest(&digest);
//! assert_eq!(signature.recover(&digest), Some(key.public_key()));
//! ```

use core::{fmt, str::FromStr};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Errors that can occur while parsing or using keys.
///
/// None of the variants carry the rejected input, so an error can be logged
/// without leaking key material.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid WIF private key")]
    InvalidWif,

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(&'static str),

    #[error("Invalid signature: {0}")]
    InvalidSignature(&'static str),
}

/// Version byte of a mainnet WIF private key
const WIF_VERSION: u8 = 0x80;

/// Suffix byte marking a WIF key whose public key is used compressed
const WIF_COMPRESSED_FLAG: u8 = 0x01;

/// Text prefix of an encoded public key
pub const PUBLIC_KEY_PREFIX: &str = "BTH";

/// Text prefix of an encoded signature
pub const SIGNATURE_PREFIX: &str = "SIG_K1_";

/// Length of a compressed SEC1 public key
pub const PUBLIC_KEY_LEN: usize = 33;

/// Length of a recoverable signature: r (32) || s (32) || v (1)
pub const SIGNATURE_LEN: usize = 65;

/// Length of a raw private key scalar
pub const PRIVATE_KEY_LEN: usize = 32;

// ============================================================================
// Private keys
// ============================================================================

/// A secp256k1 private key.
///
/// The scalar is zeroized when the key is dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct PrivateKey {
    #[zeroize(skip)] // SigningKey implements its own zeroization
    signing_key: SigningKey,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey {{ public_key: {} }}", self.public_key())
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        // SigningKey compares in constant time
        self.signing_key == other.signing_key
    }
}

impl Eq for PrivateKey {}

impl PrivateKey {
    /// Generate a new random key from the operating system RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Create a key from raw 32-byte scalar bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(Error::InvalidPrivateKey);
        }
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| Error::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Raw scalar bytes, wrapped so they are wiped when dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
        let mut field_bytes = self.signing_key.to_bytes();
        let mut out = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        out.copy_from_slice(&field_bytes);
        field_bytes.as_mut_slice().zeroize();
        out
    }

    /// Parse a Wallet Import Format string.
    ///
    /// Both the uncompressed form (`0x80 || key`) and the compressed form
    /// (`0x80 || key || 0x01`) are accepted.
    pub fn from_wif(wif: &str) -> Result<Self, Error> {
        let decoded = Zeroizing::new(
            bs58::decode(wif.trim())
                .with_check(None)
                .into_vec()
                .map_err(|_| Error::InvalidWif)?,
        );

        let key_bytes = match decoded.len() {
            33 => &decoded[1..],
            34 if decoded[33] == WIF_COMPRESSED_FLAG => &decoded[1..33],
            _ => return Err(Error::InvalidWif),
        };
        if decoded[0] != WIF_VERSION {
            return Err(Error::InvalidWif);
        }

        Self::from_bytes(key_bytes).map_err(|_| Error::InvalidWif)
    }

    /// Encode as an uncompressed Wallet Import Format string.
    pub fn to_wif(&self) -> Zeroizing<String> {
        let mut payload = Zeroizing::new([0u8; PRIVATE_KEY_LEN + 1]);
        payload[0] = WIF_VERSION;
        payload[1..].copy_from_slice(&self.to_bytes()[..]);
        Zeroizing::new(bs58::encode(&payload[..]).with_check().into_string())
    }

    /// The public key corresponding to this private key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte digest.
    ///
    /// Signatures are deterministic (RFC 6979), normalized to low-S, and carry
    /// a recovery id so the signer's public key can be recovered.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Signature {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .expect("signing a 32-byte prehash with a valid key cannot fail");

        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + 27;
        Signature(bytes)
    }
}

// ============================================================================
// Public keys
// ============================================================================

/// A compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    fn from_verifying_key(verifying_key: &VerifyingKey) -> Self {
        let point = verifying_key.to_encoded_point(true);
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(point.as_bytes());
        Self(bytes)
    }

    /// Parse a compressed SEC1 encoded point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(Error::InvalidPublicKey("expected 33 bytes"));
        }
        let verifying_key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| Error::InvalidPublicKey("not a curve point"))?;
        Ok(Self::from_verifying_key(&verifying_key))
    }

    /// The compressed SEC1 encoding.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            PUBLIC_KEY_PREFIX,
            bs58::encode(&self.0).with_check().into_string()
        )
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .trim()
            .strip_prefix(PUBLIC_KEY_PREFIX)
            .ok_or(Error::InvalidPublicKey("missing prefix"))?;
        let bytes = bs58::decode(encoded)
            .with_check(None)
            .into_vec()
            .map_err(|_| Error::InvalidPublicKey("bad base58 checksum"))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ============================================================================
// Signatures
// ============================================================================

/// A recoverable ECDSA signature: r (32) || s (32) || v (1), where v is the
/// recovery id + 27.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    /// Parse a 65-byte recoverable signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidSignature("expected 65 bytes"))?;
        K256Signature::from_slice(&bytes[..64])
            .map_err(|_| Error::InvalidSignature("invalid r or s"))?;
        Ok(Self(bytes))
    }

    /// The raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// Recover the public key that produced this signature over `digest`.
    pub fn recover(&self, digest: &[u8; 32]) -> Option<PublicKey> {
        let v = self.0[64];
        let recovery_id = RecoveryId::from_byte(v.checked_sub(27).unwrap_or(v))?;
        let signature = K256Signature::from_slice(&self.0[..64]).ok()?;
        let verifying_key =
            VerifyingKey::recover_from_prehash(digest, &signature, recovery_id).ok()?;
        Some(PublicKey::from_verifying_key(&verifying_key))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            SIGNATURE_PREFIX,
            bs58::encode(&self.0).with_check().into_string()
        )
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .trim()
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(Error::InvalidSignature("missing prefix"))?;
        let bytes = bs58::decode(encoded)
            .with_check(None)
            .into_vec()
            .map_err(|_| Error::InvalidSignature("bad base58 checksum"))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (DO NOT USE IN PRODUCTION)
    const TEST_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";

    #[test]
    fn test_wif_roundtrip() {
        let key = PrivateKey::from_wif(TEST_WIF).unwrap();
        assert_eq!(key.to_wif().as_str(), TEST_WIF);
    }

    #[test]
    fn test_compressed_wif_is_same_key() {
        let key = PrivateKey::from_wif(TEST_WIF).unwrap();

        let mut payload = vec![WIF_VERSION];
        payload.extend_from_slice(&key.to_bytes()[..]);
        payload.push(WIF_COMPRESSED_FLAG);
        let compressed = bs58::encode(&payload).with_check().into_string();

        assert_eq!(compressed.len(), 52);
        assert_eq!(PrivateKey::from_wif(&compressed).unwrap(), key);
    }

    #[test]
    fn test_invalid_wif() {
        // Not base58
        assert_eq!(PrivateKey::from_wif("0OIl"), Err(Error::InvalidWif));

        // Broken checksum (last character changed)
        let mut tampered = TEST_WIF.to_string();
        tampered.pop();
        tampered.push('4');
        assert_eq!(PrivateKey::from_wif(&tampered), Err(Error::InvalidWif));

        // Wrong version byte
        let mut payload = vec![0x81];
        payload.extend_from_slice(&[1u8; 32]);
        let wrong_version = bs58::encode(&payload).with_check().into_string();
        assert_eq!(PrivateKey::from_wif(&wrong_version), Err(Error::InvalidWif));

        // Zero scalar
        let mut payload = vec![WIF_VERSION];
        payload.extend_from_slice(&[0u8; 32]);
        let zero = bs58::encode(&payload).with_check().into_string();
        assert_eq!(PrivateKey::from_wif(&zero), Err(Error::InvalidWif));

        // Empty
        assert_eq!(PrivateKey::from_wif(""), Err(Error::InvalidWif));
    }

    #[test]
    fn test_error_does_not_echo_input() {
        let err = PrivateKey::from_wif("5Kdefinitelynotakey").unwrap_err();
        assert!(!err.to_string().contains("definitelynotakey"));
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = PrivateKey::generate();
        let b = PrivateKey::generate();
        assert_ne!(a, b);
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_public_key_string_roundtrip() {
        let public_key = PrivateKey::from_wif(TEST_WIF).unwrap().public_key();
        let text = public_key.to_string();

        assert!(text.starts_with(PUBLIC_KEY_PREFIX));
        assert_eq!(text.parse::<PublicKey>().unwrap(), public_key);
        assert!(text.trim_start_matches(PUBLIC_KEY_PREFIX).parse::<PublicKey>().is_err());
    }

    #[test]
    fn test_public_key_format() {
        let public_key = PrivateKey::generate().public_key();
        let prefix = public_key.as_bytes()[0];
        assert!(prefix == 0x02 || prefix == 0x03);
    }

    #[test]
    fn test_sign_and_recover() {
        let key = PrivateKey::from_wif(TEST_WIF).unwrap();
        let digest = [42u8; 32];

        let signature = key.sign_digest(&digest);
        assert_eq!(signature.recover(&digest), Some(key.public_key()));

        // A different digest recovers a different key
        assert_ne!(signature.recover(&[43u8; 32]), Some(key.public_key()));
    }

    #[test]
    fn test_signature_deterministic() {
        let key = PrivateKey::from_wif(TEST_WIF).unwrap();
        let digest = [9u8; 32];
        assert_eq!(key.sign_digest(&digest), key.sign_digest(&digest));
    }

    #[test]
    fn test_signature_string_roundtrip() {
        let signature = PrivateKey::generate().sign_digest(&[1u8; 32]);
        let text = signature.to_string();

        assert!(text.starts_with(SIGNATURE_PREFIX));
        assert_eq!(text.parse::<Signature>().unwrap(), signature);
    }

    #[test]
    fn test_serde_as_strings() {
        let key = PrivateKey::generate();
        let public_key = key.public_key();
        let json = serde_json::to_string(&public_key).unwrap();
        assert_eq!(json, format!("\"{}\"", public_key));
        assert_eq!(serde_json::from_str::<PublicKey>(&json).unwrap(), public_key);

        let signature = key.sign_digest(&[3u8; 32]);
        let json = serde_json::to_string(&signature).unwrap();
        assert_eq!(serde_json::from_str::<Signature>(&json).unwrap(), signature);
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = PrivateKey::from_wif(TEST_WIF).unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains(TEST_WIF));
        assert!(debug.contains(&key.public_key().to_string()));
    }
}
