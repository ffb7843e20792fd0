//! Wallet
//!
//! One named, file-backed keyring encrypted under a single password.
//!
//! A [`Wallet`] is either locked, holding only the encrypted file contents, or
//! unlocked, holding the decrypted keyring and the derived encryption key.
//! Locking drops the unlocked state on the spot; every secret it contains
//! zeroizes itself when dropped.

use bth_crypto_secp256k1::{PrivateKey, PublicKey, Signature, PRIVATE_KEY_LEN};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Result, WalletError};
use crate::storage::{EncryptionKey, KdfParams, WalletFile};

/// Prefix of generated wallet passwords
const PASSWORD_PREFIX: &str = "PW";

/// Mapping from public key to private key.
#[derive(Clone, Default)]
struct Keyring {
    keys: BTreeMap<PublicKey, PrivateKey>,
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring").finish_non_exhaustive()
    }
}

impl Keyring {
    /// Decode the plaintext stored in a wallet file: a concatenation of
    /// 32-byte private key scalars.
    fn from_plaintext(plaintext: &[u8], name: &str) -> Result<Self> {
        if plaintext.len() % PRIVATE_KEY_LEN != 0 {
            return Err(WalletError::WalletCorrupt {
                name: name.to_string(),
                reason: "keyring has a partial key".to_string(),
            });
        }

        let mut keyring = Self::default();
        for chunk in plaintext.chunks_exact(PRIVATE_KEY_LEN) {
            let key = PrivateKey::from_bytes(chunk).map_err(|_| WalletError::WalletCorrupt {
                name: name.to_string(),
                reason: "keyring holds an invalid key".to_string(),
            })?;
            keyring.insert(key);
        }
        Ok(keyring)
    }

    fn to_plaintext(&self) -> Zeroizing<Vec<u8>> {
        let mut plaintext = Zeroizing::new(Vec::with_capacity(self.keys.len() * PRIVATE_KEY_LEN));
        for key in self.keys.values() {
            plaintext.extend_from_slice(&key.to_bytes()[..]);
        }
        plaintext
    }

    /// Insert a key; returns false if it was already present.
    fn insert(&mut self, key: PrivateKey) -> bool {
        let public_key = key.public_key();
        if self.keys.contains_key(&public_key) {
            return false;
        }
        self.keys.insert(public_key, key);
        true
    }
}

/// Decrypted wallet contents, only present while unlocked.
struct UnlockedKeyring {
    keyring: Keyring,
    /// Kept to re-encrypt the keyring after a mutation.
    key: EncryptionKey,
}

/// Lock state of a wallet.
enum WalletState {
    /// No key material in memory.
    Locked,
    /// Keyring decrypted and available for signing.
    Unlocked(UnlockedKeyring),
}

/// A named, password-encrypted keyring file plus its unlock state.
pub struct Wallet {
    name: String,
    path: PathBuf,
    file: WalletFile,
    state: WalletState,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}

impl Wallet {
    /// Create a new, empty wallet at `path`.
    ///
    /// A random password is generated and returned; it is not stored
    /// anywhere, so the caller must keep it. The new wallet starts unlocked.
    pub fn create(name: &str, path: &Path, kdf: KdfParams) -> Result<(Self, Zeroizing<String>)> {
        if WalletFile::exists(path) {
            return Err(WalletError::WalletAlreadyExists(name.to_string()));
        }

        let password = generate_password();
        let keyring = Keyring::default();
        let (file, key) = WalletFile::seal(&keyring.to_plaintext(), &password, kdf)?;
        file.save_new(path).map_err(|err| match err {
            WalletError::Io(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                WalletError::WalletAlreadyExists(name.to_string())
            }
            err => err,
        })?;

        debug!("Created wallet file {}", path.display());

        let wallet = Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            file,
            state: WalletState::Unlocked(UnlockedKeyring { keyring, key }),
        };
        Ok((wallet, password))
    }

    /// Load an existing wallet file without decrypting it.
    pub fn open(name: &str, path: &Path) -> Result<Self> {
        let file = WalletFile::load(path, name)?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            file,
            state: WalletState::Locked,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self.state, WalletState::Unlocked(_))
    }

    pub fn is_locked(&self) -> bool {
        !self.is_unlocked()
    }

    /// Decrypt the keyring into memory.
    ///
    /// Unlocking an already unlocked wallet with its password is a no-op;
    /// any other password fails and leaves the keyring untouched.
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        let key = self
            .file
            .unlock_key(password)?
            .ok_or_else(|| WalletError::InvalidPassword(self.name.clone()))?;

        if self.is_unlocked() {
            return Ok(());
        }

        let plaintext = self.file.open(&key, &self.name)?;
        let keyring = Keyring::from_plaintext(&plaintext, &self.name)?;
        self.state = WalletState::Unlocked(UnlockedKeyring { keyring, key });
        Ok(())
    }

    /// Discard the in-memory keyring. No-op if already locked.
    pub fn lock(&mut self) {
        // The previous state is dropped here, wiping the keyring and the key.
        self.state = WalletState::Locked;
    }

    /// Import a WIF private key and persist the keyring.
    ///
    /// Importing a key that is already present changes nothing, on disk or in
    /// memory.
    pub fn import_key(&mut self, wif_key: &str) -> Result<PublicKey> {
        self.unlocked()?;
        let key = PrivateKey::from_wif(wif_key).map_err(WalletError::InvalidKeyFormat)?;
        let public_key = key.public_key();

        if self.unlocked()?.keyring.keys.contains_key(&public_key) {
            debug!("Key {} already present in wallet {}", public_key, self.name);
            return Ok(public_key);
        }

        let mut keyring = self.unlocked()?.keyring.clone();
        keyring.insert(key);
        self.persist(keyring)?;
        Ok(public_key)
    }

    /// Generate a fresh key inside the wallet and persist the keyring.
    pub fn create_key(&mut self) -> Result<PublicKey> {
        let mut keyring = self.unlocked()?.keyring.clone();
        let key = PrivateKey::generate();
        let public_key = key.public_key();
        keyring.insert(key);
        self.persist(keyring)?;
        Ok(public_key)
    }

    /// Remove a key after re-checking the wallet password.
    pub fn remove_key(&mut self, password: &str, public_key: &PublicKey) -> Result<()> {
        self.unlocked()?;
        if self.file.unlock_key(password)?.is_none() {
            return Err(WalletError::InvalidPassword(self.name.clone()));
        }

        let mut keyring = self.unlocked()?.keyring.clone();
        if keyring.keys.remove(public_key).is_none() {
            return Err(WalletError::KeyNotFound {
                name: self.name.clone(),
                public_key: *public_key,
            });
        }
        self.persist(keyring)
    }

    /// Snapshot of the public keys held.
    pub fn public_keys(&self) -> Result<BTreeSet<PublicKey>> {
        Ok(self.unlocked()?.keyring.keys.keys().copied().collect())
    }

    /// Snapshot of the key pairs held.
    pub fn key_pairs(&self) -> Result<BTreeMap<PublicKey, PrivateKey>> {
        Ok(self.unlocked()?.keyring.keys.clone())
    }

    /// Sign `digest` with every requested key this wallet holds.
    ///
    /// Keys the wallet does not hold are absent from the result.
    pub fn try_sign(
        &self,
        digest: &[u8; 32],
        public_keys: &BTreeSet<PublicKey>,
    ) -> Result<BTreeMap<PublicKey, Signature>> {
        let keyring = &self.unlocked()?.keyring;
        Ok(public_keys
            .iter()
            .filter_map(|public_key| {
                keyring
                    .keys
                    .get(public_key)
                    .map(|key| (*public_key, key.sign_digest(digest)))
            })
            .collect())
    }

    fn unlocked(&self) -> Result<&UnlockedKeyring> {
        match &self.state {
            WalletState::Unlocked(unlocked) => Ok(unlocked),
            WalletState::Locked => Err(WalletError::WalletLocked(self.name.clone())),
        }
    }

    /// Write `keyring` to disk, then make it the in-memory keyring.
    fn persist(&mut self, keyring: Keyring) -> Result<()> {
        let WalletState::Unlocked(unlocked) = &mut self.state else {
            return Err(WalletError::WalletLocked(self.name.clone()));
        };

        let file = self.file.reseal(&keyring.to_plaintext(), &unlocked.key)?;
        file.save(&self.path)?;

        self.file = file;
        unlocked.keyring = keyring;
        Ok(())
    }
}

/// Generate a wallet password: "PW" followed by the WIF of a random key.
fn generate_password() -> Zeroizing<String> {
    let seed = PrivateKey::generate();
    let wif = seed.to_wif();
    let mut password = Zeroizing::new(String::with_capacity(PASSWORD_PREFIX.len() + wif.len()));
    password.push_str(PASSWORD_PREFIX);
    password.push_str(&wif);
    password
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::wallet_path;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    // Well-known development key (DO NOT USE IN PRODUCTION)
    const TEST_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";

    fn light_kdf() -> KdfParams {
        KdfParams {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn create_wallet(dir: &TempDir, name: &str) -> (Wallet, Zeroizing<String>) {
        Wallet::create(name, &wallet_path(dir.path(), name), light_kdf()).unwrap()
    }

    #[test]
    fn test_create_starts_unlocked_and_empty() {
        let dir = TempDir::new().unwrap();
        let (wallet, password) = create_wallet(&dir, "default");

        assert!(wallet.is_unlocked());
        assert!(wallet.public_keys().unwrap().is_empty());
        assert!(password.starts_with(PASSWORD_PREFIX));
        assert!(wallet.path().exists());
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let _ = create_wallet(&dir, "default");
        let result = Wallet::create("default", &wallet_path(dir.path(), "default"), light_kdf());
        assert_matches!(result, Err(WalletError::WalletAlreadyExists(_)));
    }

    #[test]
    fn test_create_leaves_existing_file_intact() {
        let dir = TempDir::new().unwrap();
        let path = wallet_path(dir.path(), "default");
        fs::write(&path, b"someone else's file").unwrap();

        let result = Wallet::create("default", &path, light_kdf());
        assert_matches!(result, Err(WalletError::WalletAlreadyExists(_)));
        assert_eq!(fs::read(&path).unwrap(), b"someone else's file");
    }

    #[test]
    fn test_open_starts_locked() {
        let dir = TempDir::new().unwrap();
        let (wallet, _) = create_wallet(&dir, "default");

        let opened = Wallet::open("default", wallet.path()).unwrap();
        assert!(opened.is_locked());
        assert_matches!(opened.public_keys(), Err(WalletError::WalletLocked(_)));
    }

    #[test]
    fn test_lock_unlock_roundtrip() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, password) = create_wallet(&dir, "default");
        wallet.import_key(TEST_WIF).unwrap();
        let before = wallet.key_pairs().unwrap();

        wallet.lock();
        assert!(wallet.is_locked());
        assert_matches!(wallet.key_pairs(), Err(WalletError::WalletLocked(_)));

        wallet.unlock(&password).unwrap();
        assert_eq!(wallet.key_pairs().unwrap(), before);
    }

    #[test]
    fn test_wrong_password_keeps_locked_and_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, _) = create_wallet(&dir, "default");
        wallet.lock();
        let on_disk = fs::read(wallet.path()).unwrap();

        assert_matches!(wallet.unlock("wrong"), Err(WalletError::InvalidPassword(_)));
        assert!(wallet.is_locked());
        assert_eq!(fs::read(wallet.path()).unwrap(), on_disk);
    }

    #[test]
    fn test_unlock_when_unlocked() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, password) = create_wallet(&dir, "default");
        wallet.import_key(TEST_WIF).unwrap();

        // Same password is a no-op
        wallet.unlock(&password).unwrap();
        assert_eq!(wallet.public_keys().unwrap().len(), 1);

        // Different password fails without touching the keyring
        assert_matches!(wallet.unlock("other"), Err(WalletError::InvalidPassword(_)));
        assert!(wallet.is_unlocked());
        assert_eq!(wallet.public_keys().unwrap().len(), 1);
    }

    #[test]
    fn test_import_requires_unlock() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, _) = create_wallet(&dir, "default");
        wallet.lock();

        assert_matches!(wallet.import_key(TEST_WIF), Err(WalletError::WalletLocked(_)));
        // Locked is reported before the key is even parsed
        assert_matches!(wallet.import_key("garbage"), Err(WalletError::WalletLocked(_)));
    }

    #[test]
    fn test_import_invalid_wif() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, _) = create_wallet(&dir, "default");
        let on_disk = fs::read(wallet.path()).unwrap();

        assert_matches!(wallet.import_key("not-a-key"), Err(WalletError::InvalidKeyFormat(_)));
        assert!(wallet.public_keys().unwrap().is_empty());
        assert_eq!(fs::read(wallet.path()).unwrap(), on_disk);
    }

    #[test]
    fn test_import_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, _) = create_wallet(&dir, "default");

        let first = wallet.import_key(TEST_WIF).unwrap();
        let after_first = fs::read(wallet.path()).unwrap();
        let second = wallet.import_key(TEST_WIF).unwrap();
        let after_second = fs::read(wallet.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(wallet.public_keys().unwrap().len(), 1);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_import_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, password) = create_wallet(&dir, "default");
        let public_key = wallet.import_key(TEST_WIF).unwrap();

        let mut reopened = Wallet::open("default", wallet.path()).unwrap();
        reopened.unlock(&password).unwrap();
        assert!(reopened.public_keys().unwrap().contains(&public_key));
    }

    #[test]
    fn test_create_and_remove_key() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, password) = create_wallet(&dir, "default");

        let public_key = wallet.create_key().unwrap();
        assert!(wallet.public_keys().unwrap().contains(&public_key));

        assert_matches!(
            wallet.remove_key("wrong", &public_key),
            Err(WalletError::InvalidPassword(_))
        );
        wallet.remove_key(&password, &public_key).unwrap();
        assert!(wallet.public_keys().unwrap().is_empty());

        assert_matches!(
            wallet.remove_key(&password, &public_key),
            Err(WalletError::KeyNotFound { .. })
        );
    }

    #[test]
    fn test_try_sign_subset() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, _) = create_wallet(&dir, "default");
        let held = wallet.import_key(TEST_WIF).unwrap();
        let absent = PrivateKey::generate().public_key();

        let digest = [5u8; 32];
        let requested: BTreeSet<_> = [held, absent].into_iter().collect();
        let signatures = wallet.try_sign(&digest, &requested).unwrap();

        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[&held].recover(&digest), Some(held));
    }

    #[test]
    fn test_no_plaintext_on_disk() {
        let dir = TempDir::new().unwrap();
        let (mut wallet, password) = create_wallet(&dir, "default");
        let key = PrivateKey::from_wif(TEST_WIF).unwrap();
        wallet.import_key(TEST_WIF).unwrap();

        let on_disk = fs::read(wallet.path()).unwrap();
        let text = String::from_utf8_lossy(&on_disk);
        assert!(!text.contains(password.as_str()));
        assert!(!text.contains(TEST_WIF));
        assert!(!text.contains(&hex::encode(&key.to_bytes()[..])));
        assert!(!on_disk
            .windows(PRIVATE_KEY_LEN)
            .any(|window| window == &key.to_bytes()[..]));
    }

    #[test]
    fn test_keyring_plaintext_rejects_partial_key() {
        assert_matches!(
            Keyring::from_plaintext(&[1u8; 33], "w"),
            Err(WalletError::WalletCorrupt { .. })
        );
    }
}
