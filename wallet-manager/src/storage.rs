//! Encrypted Wallet Storage
//!
//! Securely stores a wallet's keyring using:
//! - Argon2id for password-based key derivation
//! - ChaCha20-Poly1305 for authenticated encryption
//! - A SHA-256 verifier over the derived key, so a candidate password can be
//!   rejected before any ciphertext is touched
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! failed write never leaves a half-written wallet behind.

use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Result, WalletError};

/// Current wallet file format version
const WALLET_VERSION: u32 = 1;

/// File extension of wallet files
pub const WALLET_EXTENSION: &str = "wallet";

/// Additional authenticated data binding ciphertext to this file format
const WALLET_AAD: &[u8] = b"bth-wallet-v1";

/// Domain tag of the password verifier
const VERIFIER_DOMAIN: &[u8] = b"bth-wallet-verifier-v1";

/// Argon2 parameters (tuned for security vs. usability)
const ARGON2_MEMORY_KB: u32 = 65536; // 64 MB
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Argon2id tuning parameters, stored alongside the ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: ARGON2_MEMORY_KB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

impl KdfParams {
    fn to_argon2(self) -> Result<argon2::Params> {
        argon2::Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|_| WalletError::Crypto("invalid Argon2 parameters"))
    }
}

/// A symmetric key derived from a wallet password.
pub struct EncryptionKey(Zeroizing<[u8; KEY_LEN]>);

impl EncryptionKey {
    fn verifier(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(VERIFIER_DOMAIN);
        hasher.update(self.0.as_slice());
        hasher.finalize().into()
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(self.0.as_slice())
            .map_err(|_| WalletError::Crypto("failed to create cipher"))
    }
}

/// Derive a 32-byte encryption key from password using Argon2id
pub fn derive_key(password: &str, salt: &str, params: KdfParams) -> Result<EncryptionKey> {
    let salt = SaltString::from_b64(salt).map_err(|_| WalletError::Crypto("invalid salt format"))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params.to_argon2()?,
    );

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| WalletError::Crypto("key derivation failed"))?;

    let hash_output = hash
        .hash
        .ok_or(WalletError::Crypto("no key derivation output"))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&hash_output.as_bytes()[..KEY_LEN]);

    Ok(EncryptionKey(key))
}

/// Nonce and ciphertext produced by one encryption.
pub struct Sealed {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<Sealed> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill(&mut nonce);

    let ciphertext = key
        .cipher()?
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: WALLET_AAD,
            },
        )
        .map_err(|_| WalletError::Crypto("encryption failed"))?;

    Ok(Sealed { nonce, ciphertext })
}

/// Decrypt and authenticate a sealed payload. `None` on any failure.
pub fn decrypt(sealed: &Sealed, key: &EncryptionKey) -> Option<Zeroizing<Vec<u8>>> {
    key.cipher()
        .ok()?
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: WALLET_AAD,
            },
        )
        .ok()
        .map(Zeroizing::new)
}

/// Encrypted wallet file structure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletFile {
    /// File format version
    version: u32,

    /// Argon2id parameters the key was derived with
    kdf: KdfParams,

    /// Argon2 salt (B64 encoded)
    salt: String,

    /// Password verifier (hex encoded)
    verifier: String,

    /// ChaCha20-Poly1305 nonce (12 bytes, hex encoded)
    nonce: String,

    /// Encrypted keyring (hex encoded)
    ciphertext: String,
}

impl WalletFile {
    /// Encrypt a keyring under a new password with a fresh salt.
    ///
    /// Returns the file and the derived key, which the caller keeps while the
    /// wallet stays unlocked.
    pub fn seal(
        plaintext: &[u8],
        password: &str,
        kdf: KdfParams,
    ) -> Result<(Self, EncryptionKey)> {
        let salt = SaltString::generate(&mut OsRng);
        let key = derive_key(password, salt.as_str(), kdf)?;
        let file = Self::build(kdf, salt.to_string(), plaintext, &key)?;
        Ok((file, key))
    }

    /// Re-encrypt a keyring under the key this file was sealed with.
    pub fn reseal(&self, plaintext: &[u8], key: &EncryptionKey) -> Result<Self> {
        Self::build(self.kdf, self.salt.clone(), plaintext, key)
    }

    fn build(kdf: KdfParams, salt: String, plaintext: &[u8], key: &EncryptionKey) -> Result<Self> {
        let sealed = encrypt(plaintext, key)?;
        Ok(Self {
            version: WALLET_VERSION,
            kdf,
            salt,
            verifier: hex::encode(key.verifier()),
            nonce: hex::encode(sealed.nonce),
            ciphertext: hex::encode(sealed.ciphertext),
        })
    }

    /// Derive the key for `password` and check it against the verifier.
    ///
    /// Returns `None` if the password is wrong.
    pub fn unlock_key(&self, password: &str) -> Result<Option<EncryptionKey>> {
        let key = derive_key(password, &self.salt, self.kdf)?;
        if self.verifies(&key) {
            Ok(Some(key))
        } else {
            Ok(None)
        }
    }

    /// Constant-time comparison of a key against the stored verifier.
    pub fn verifies(&self, key: &EncryptionKey) -> bool {
        match hex::decode(&self.verifier) {
            Ok(stored) => stored.as_slice().ct_eq(&key.verifier()).into(),
            Err(_) => false,
        }
    }

    /// Decrypt the keyring plaintext.
    pub fn open(&self, key: &EncryptionKey, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        let sealed = self.sealed().map_err(|reason| corrupt(name, reason))?;
        decrypt(&sealed, key).ok_or_else(|| corrupt(name, "ciphertext failed authentication"))
    }

    fn sealed(&self) -> std::result::Result<Sealed, &'static str> {
        let nonce: [u8; NONCE_LEN] = hex::decode(&self.nonce)
            .map_err(|_| "invalid nonce format")?
            .try_into()
            .map_err(|_| "invalid nonce length")?;
        let ciphertext = hex::decode(&self.ciphertext).map_err(|_| "invalid ciphertext format")?;
        Ok(Sealed { nonce, ciphertext })
    }

    fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.version != WALLET_VERSION {
            return Err("unsupported wallet version");
        }
        SaltString::from_b64(&self.salt).map_err(|_| "invalid salt format")?;
        self.kdf.to_argon2().map_err(|_| "invalid Argon2 parameters")?;
        let verifier = hex::decode(&self.verifier).map_err(|_| "invalid verifier format")?;
        if verifier.len() != 32 {
            return Err("invalid verifier length");
        }
        self.sealed().map(|_| ())
    }

    /// Save the wallet to a file, replacing any previous version atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let temp_path = self.write_temp(path)?;
        if let Err(err) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }

        debug!("Saved wallet file {}", path.display());
        Ok(())
    }

    /// Save to a path that must not exist yet.
    ///
    /// The file is linked into place, so an existing file, even one created
    /// by another process after any earlier check, is never replaced. Fails
    /// with an `AlreadyExists` I/O error in that case.
    pub fn save_new(&self, path: &Path) -> Result<()> {
        let temp_path = self.write_temp(path)?;
        let linked = fs::hard_link(&temp_path, path);
        let _ = fs::remove_file(&temp_path);
        linked?;

        debug!("Created wallet file {}", path.display());
        Ok(())
    }

    /// Write the serialized file to its temporary sibling and flush it.
    fn write_temp(&self, path: &Path) -> Result<PathBuf> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self).map_err(io::Error::from)?;

        let temp_path = temp_path(path);
        if let Err(err) = write_restricted(&temp_path, json.as_bytes()) {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }
        Ok(temp_path)
    }

    /// Load a wallet from a file
    pub fn load(path: &Path, name: &str) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            debug!("Failed to read wallet file {}: {}", path.display(), e);
            WalletError::WalletNotFound(name.to_string())
        })?;

        let file: Self =
            serde_json::from_str(&json).map_err(|_| corrupt(name, "failed to parse wallet file"))?;
        file.validate().map_err(|reason| corrupt(name, reason))?;

        Ok(file)
    }

    /// Check if a wallet file exists
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }
}

/// Path of the wallet file for `name` under `dir`.
pub fn wallet_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, WALLET_EXTENSION))
}

/// Names of all wallet files in `dir`, sorted.
pub fn wallet_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(WALLET_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn corrupt(name: &str, reason: &str) -> WalletError {
    WalletError::WalletCorrupt {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut temp: OsString = path.as_os_str().to_owned();
    temp.push(".tmp");
    PathBuf::from(temp)
}

/// Write with restricted permissions and flush to disk
fn write_restricted(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
