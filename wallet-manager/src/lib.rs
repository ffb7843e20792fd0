//! Botho Keystore
//!
//! Password-protected custody of secp256k1 signing keys for node operators.
//!
//! ## Security Model
//!
//! - Each wallet is one file, encrypted with a key derived from its password
//! - Private keys exist in plaintext only in memory, only while unlocked
//! - Locking drops and wipes the plaintext keyring
//! - All wallets lock after a configurable period of inactivity
//! - Private keys are never returned by signing; only signatures leave

pub mod config;
pub mod error;
pub mod manager;
pub mod storage;
pub mod transaction;
pub mod wallet;

pub use bth_crypto_secp256k1::{PrivateKey, PublicKey, Signature};
pub use config::KeystoreConfig;
pub use error::{Result, WalletError};
pub use manager::WalletManager;
pub use storage::KdfParams;
pub use transaction::{ChainId, SignedTransaction};
pub use wallet::Wallet;
