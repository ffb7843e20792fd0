//! Wallet Errors
//!
//! Every failure the keystore reports to its caller. Messages name wallets
//! and public keys only; passwords, WIF strings, derived keys and private
//! key bytes never appear in an error.

use bth_crypto_secp256k1::PublicKey;
use thiserror::Error;

/// Result alias used throughout the keystore.
pub type Result<T> = std::result::Result<T, WalletError>;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("wallet already exists: {0}")]
    WalletAlreadyExists(String),

    #[error("wallet file is corrupt: {name}: {reason}")]
    WalletCorrupt { name: String, reason: String },

    #[error("invalid password for wallet: {0}")]
    InvalidPassword(String),

    #[error("wallet is locked: {0}")]
    WalletLocked(String),

    /// Aggregate form of [`WalletError::WalletLocked`]: no tracked wallet is
    /// unlocked.
    #[error("no unlocked wallets")]
    NoUnlockedWallets,

    #[error("invalid private key format")]
    InvalidKeyFormat(#[source] bth_crypto_secp256k1::Error),

    #[error("missing signing keys: {}", format_keys(.0))]
    MissingSigningKey(Vec<PublicKey>),

    #[error("key not found in wallet {name}: {public_key}")]
    KeyNotFound { name: String, public_key: PublicKey },

    #[error("invalid wallet name: {0:?}")]
    InvalidWalletName(String),

    #[error("encryption failure: {0}")]
    Crypto(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WalletError {
    /// True for both the per-wallet and the aggregate locked errors.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::WalletLocked(_) | Self::NoUnlockedWallets)
    }
}

fn format_keys(keys: &[PublicKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
