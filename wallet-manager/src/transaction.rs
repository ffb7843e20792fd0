//! Transactions handed to the keystore for signing.
//!
//! The keystore does not interpret transaction contents. It only needs the
//! bytes to sign and the chain they are meant for: the signing digest binds
//! both, so a signature made for one chain does not verify on another.

use bth_crypto_secp256k1::{PublicKey, Signature};
use hex::FromHex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Identifier of the chain a transaction is signed for.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId([u8; 32]);

impl ChainId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self)
    }
}

impl FromStr for ChainId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <[u8; 32]>::from_hex(s.trim()).map(Self)
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// An opaque transaction plus the signatures collected for it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Serialized transaction body (hex in JSON)
    #[serde(with = "hex")]
    pub payload: Vec<u8>,

    /// Data that is signed over but pruned from the transaction body
    #[serde(default, with = "hex", skip_serializing_if = "Vec::is_empty")]
    pub context_free_data: Vec<u8>,

    #[serde(default)]
    pub signatures: Vec<Signature>,
}

impl SignedTransaction {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            ..Default::default()
        }
    }

    pub fn with_context_free_data(mut self, data: Vec<u8>) -> Self {
        self.context_free_data = data;
        self
    }

    /// SHA-256(chain_id || payload || cfd_hash), where cfd_hash is the
    /// SHA-256 of the context-free data, or zeros when there is none.
    pub fn signing_digest(&self, chain_id: &ChainId) -> [u8; 32] {
        let cfd_hash: [u8; 32] = if self.context_free_data.is_empty() {
            [0u8; 32]
        } else {
            Sha256::digest(&self.context_free_data).into()
        };

        let mut hasher = Sha256::new();
        hasher.update(chain_id.as_bytes());
        hasher.update(&self.payload);
        hasher.update(cfd_hash);
        hasher.finalize().into()
    }

    /// Public keys recovered from the attached signatures.
    pub fn signers(&self, chain_id: &ChainId) -> BTreeSet<PublicKey> {
        let digest = self.signing_digest(chain_id);
        self.signatures
            .iter()
            .filter_map(|signature| signature.recover(&digest))
            .collect()
    }
}
