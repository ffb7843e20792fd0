//! Wallet Manager
//!
//! Tracks named wallets in one directory, locks all of them after a period of
//! inactivity, and signs transactions with keys gathered from every unlocked
//! wallet.
//!
//! All state sits behind a single mutex. Each public operation holds it for
//! its whole body, so the timeout check, the keyring access, and the activity
//! update of one call are atomic with respect to every other call.

use bth_crypto_secp256k1::{PrivateKey, PublicKey, Signature};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::KeystoreConfig;
use crate::error::{Result, WalletError};
use crate::storage::{self, KdfParams};
use crate::transaction::{ChainId, SignedTransaction};
use crate::wallet::Wallet;

/// Marker appended to unlocked wallet names by [`WalletManager::list_wallets`]
pub const UNLOCKED_MARKER: &str = " *";

/// Manages a set of named wallets.
///
/// Every method takes `&self`; share the manager between threads with `Arc`.
pub struct WalletManager {
    inner: Mutex<ManagerState>,
}

impl fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletManager").finish_non_exhaustive()
    }
}

struct ManagerState {
    wallets: BTreeMap<String, Wallet>,
    dir: PathBuf,
    /// `None` means wallets never lock on their own.
    timeout: Option<Duration>,
    last_activity: Instant,
    kdf: KdfParams,
    chain_signing_key: Option<PrivateKey>,
}

impl ManagerState {
    /// Lock everything if the inactivity timeout has passed, then record
    /// this call as activity.
    fn check_timeout(&mut self) {
        let now = Instant::now();
        if let Some(timeout) = self.timeout {
            if now.saturating_duration_since(self.last_activity) > timeout {
                debug!("Inactivity timeout of {:?} expired, locking all wallets", timeout);
                self.lock_all();
            }
        }
        self.last_activity = self.last_activity.max(now);
    }

    fn lock_all(&mut self) {
        for wallet in self.wallets.values_mut() {
            wallet.lock();
        }
    }

    fn wallet_mut(&mut self, name: &str) -> Result<&mut Wallet> {
        self.wallets
            .get_mut(name)
            .ok_or_else(|| WalletError::WalletNotFound(name.to_string()))
    }

    fn unlocked_wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values().filter(|wallet| wallet.is_unlocked())
    }
}

impl WalletManager {
    /// A manager for wallet files in `dir`, with no inactivity timeout.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(ManagerState {
                wallets: BTreeMap::new(),
                dir: dir.into(),
                timeout: None,
                last_activity: Instant::now(),
                kdf: KdfParams::default(),
                chain_signing_key: None,
            }),
        }
    }

    /// Build a manager from configuration.
    pub fn from_config(config: &KeystoreConfig) -> Result<Self> {
        let mut manager = Self::new(&config.wallet_dir).with_kdf_params(config.kdf);

        let state = manager.inner.get_mut();
        state.timeout = config.unlock_timeout().filter(|t| *t != Duration::MAX);
        if let Some(wif) = &config.chain_signing_key {
            let key = PrivateKey::from_wif(wif).map_err(WalletError::InvalidKeyFormat)?;
            state.chain_signing_key = Some(key);
        }

        Ok(manager)
    }

    /// Argon2 parameters used for wallets created from now on.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.inner.get_mut().kdf = kdf;
        self
    }

    /// Set the directory wallet files are created in and opened from.
    pub fn set_dir(&self, dir: impl Into<PathBuf>) {
        let mut state = self.inner.lock();
        state.check_timeout();
        state.dir = dir.into();
    }

    pub fn dir(&self) -> PathBuf {
        self.inner.lock().dir.clone()
    }

    /// Lock all wallets after `timeout` without activity.
    ///
    /// An already expired window is enforced first; the new window then
    /// starts now, so a shorter timeout applies immediately.
    /// `Duration::MAX` disables the timeout.
    pub fn set_timeout(&self, timeout: Duration) {
        let mut state = self.inner.lock();
        state.check_timeout();
        state.timeout = (timeout != Duration::MAX).then_some(timeout);
        info!("Wallet inactivity timeout set to {:?}", state.timeout);
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.inner.lock().timeout
    }

    /// Set the chain's own signing key, usable whether or not any wallet is
    /// unlocked.
    pub fn set_chain_signing_key(&self, key: Option<PrivateKey>) {
        let mut state = self.inner.lock();
        state.check_timeout();
        state.chain_signing_key = key;
    }

    /// Create a new wallet file `{dir}/{name}.wallet`.
    ///
    /// Returns the generated password. It is not stored anywhere and cannot
    /// be recovered; the new wallet starts unlocked.
    pub fn create(&self, name: &str) -> Result<Zeroizing<String>> {
        let mut state = self.inner.lock();
        state.check_timeout();
        validate_wallet_name(name)?;

        if state.wallets.contains_key(name) {
            return Err(WalletError::WalletAlreadyExists(name.to_string()));
        }

        let path = storage::wallet_path(&state.dir, name);
        let (wallet, password) = Wallet::create(name, &path, state.kdf)?;
        state.wallets.insert(name.to_string(), wallet);

        info!("Created wallet {} at {}", name, path.display());
        Ok(password)
    }

    /// Open the existing wallet file `{dir}/{name}.wallet`, locked.
    pub fn open(&self, name: &str) -> Result<()> {
        let mut state = self.inner.lock();
        state.check_timeout();
        validate_wallet_name(name)?;

        if state.wallets.contains_key(name) {
            return Err(WalletError::WalletAlreadyExists(name.to_string()));
        }

        let path = storage::wallet_path(&state.dir, name);
        let wallet = Wallet::open(name, &path)?;
        state.wallets.insert(name.to_string(), wallet);

        info!("Opened wallet {}", name);
        Ok(())
    }

    /// Wallet names in ascending order, with [`UNLOCKED_MARKER`] appended to
    /// unlocked ones. For display only.
    pub fn list_wallets(&self) -> Vec<String> {
        let mut state = self.inner.lock();
        state.check_timeout();

        state
            .wallets
            .values()
            .map(|wallet| {
                if wallet.is_unlocked() {
                    format!("{}{}", wallet.name(), UNLOCKED_MARKER)
                } else {
                    wallet.name().to_string()
                }
            })
            .collect()
    }

    /// Key pairs of all unlocked wallets.
    ///
    /// Wallets are merged in ascending name order; if two hold the same
    /// public key, the later one wins.
    pub fn list_keys(&self) -> Result<BTreeMap<PublicKey, PrivateKey>> {
        let mut state = self.inner.lock();
        state.check_timeout();

        let mut keys = BTreeMap::new();
        let mut any_unlocked = false;
        for wallet in state.unlocked_wallets() {
            any_unlocked = true;
            keys.extend(wallet.key_pairs()?);
        }

        if !any_unlocked {
            return Err(WalletError::NoUnlockedWallets);
        }
        Ok(keys)
    }

    /// Public keys of all unlocked wallets.
    pub fn get_public_keys(&self) -> Result<BTreeSet<PublicKey>> {
        let mut state = self.inner.lock();
        state.check_timeout();

        let mut keys = BTreeSet::new();
        let mut any_unlocked = false;
        for wallet in state.unlocked_wallets() {
            any_unlocked = true;
            keys.extend(wallet.public_keys()?);
        }

        if !any_unlocked {
            return Err(WalletError::NoUnlockedWallets);
        }
        Ok(keys)
    }

    /// Lock every tracked wallet.
    pub fn lock_all(&self) {
        let mut state = self.inner.lock();
        state.check_timeout();
        state.lock_all();
        info!("Locked all wallets");
    }

    /// Lock one wallet. No-op if it is already locked.
    pub fn lock(&self, name: &str) -> Result<()> {
        let mut state = self.inner.lock();
        state.check_timeout();
        state.wallet_mut(name)?.lock();
        info!("Locked wallet {}", name);
        Ok(())
    }

    /// Unlock one wallet with the password returned by [`Self::create`].
    pub fn unlock(&self, name: &str, password: &str) -> Result<()> {
        let mut state = self.inner.lock();
        state.check_timeout();

        match state.wallet_mut(name)?.unlock(password) {
            Ok(()) => {
                info!("Unlocked wallet {}", name);
                Ok(())
            }
            Err(err) => {
                warn!("Failed to unlock wallet {}: {}", name, err);
                Err(err)
            }
        }
    }

    /// Import a WIF private key into an unlocked wallet.
    pub fn import_key(&self, name: &str, wif_key: &str) -> Result<PublicKey> {
        let mut state = self.inner.lock();
        state.check_timeout();

        let public_key = state.wallet_mut(name)?.import_key(wif_key)?;
        info!("Imported key {} into wallet {}", public_key, name);
        Ok(public_key)
    }

    /// Generate a new key inside an unlocked wallet.
    pub fn create_key(&self, name: &str) -> Result<PublicKey> {
        let mut state = self.inner.lock();
        state.check_timeout();

        let public_key = state.wallet_mut(name)?.create_key()?;
        info!("Created key {} in wallet {}", public_key, name);
        Ok(public_key)
    }

    /// Remove a key from an unlocked wallet; the password is checked again.
    pub fn remove_key(&self, name: &str, password: &str, public_key: &PublicKey) -> Result<()> {
        let mut state = self.inner.lock();
        state.check_timeout();

        state.wallet_mut(name)?.remove_key(password, public_key)?;
        info!("Removed key {} from wallet {}", public_key, name);
        Ok(())
    }

    /// Sign `txn` for `chain_id` with exactly the keys in `public_keys`.
    ///
    /// The chain signing key is used first when it is configured and
    /// requested, then unlocked wallets in ascending name order; the first
    /// signature found for a key wins. Fails without signing anything if any
    /// requested key is unavailable. Signatures are appended in ascending
    /// public key order.
    pub fn sign_transaction(
        &self,
        mut txn: SignedTransaction,
        public_keys: &BTreeSet<PublicKey>,
        chain_id: &ChainId,
    ) -> Result<SignedTransaction> {
        let mut state = self.inner.lock();
        state.check_timeout();

        let digest = txn.signing_digest(chain_id);
        let mut signatures: BTreeMap<PublicKey, Signature> = BTreeMap::new();

        if let Some(chain_key) = &state.chain_signing_key {
            let chain_public_key = chain_key.public_key();
            if public_keys.contains(&chain_public_key) {
                signatures.insert(chain_public_key, chain_key.sign_digest(&digest));
            }
        }

        for wallet in state.unlocked_wallets() {
            for (public_key, signature) in wallet.try_sign(&digest, public_keys)? {
                signatures.entry(public_key).or_insert(signature);
            }
        }

        let missing: Vec<PublicKey> = public_keys
            .iter()
            .filter(|public_key| !signatures.contains_key(public_key))
            .copied()
            .collect();
        if !missing.is_empty() {
            warn!(
                "Cannot sign transaction for chain {}: {} key(s) unavailable",
                chain_id,
                missing.len()
            );
            return Err(WalletError::MissingSigningKey(missing));
        }

        debug!(
            "Signed transaction for chain {} with {} key(s)",
            chain_id,
            signatures.len()
        );
        txn.signatures.extend(signatures.into_values());
        Ok(txn)
    }
}

impl Default for WalletManager {
    fn default() -> Self {
        Self::new(Path::new("."))
    }
}

/// Wallet names are file stems: ASCII alphanumerics, `.`, `_` and `-`, not
/// starting with `.`.
pub fn validate_wallet_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(WalletError::InvalidWalletName(name.to_string()))
    }
}
