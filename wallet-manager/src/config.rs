use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::KdfParams;

/// Keystore configuration, read from `config.toml`
#[derive(Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// Directory holding `{name}.wallet` files
    #[serde(default = "default_wallet_dir")]
    pub wallet_dir: PathBuf,

    /// Lock all wallets after this many seconds without activity.
    /// Absent means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_timeout_secs: Option<u64>,

    /// WIF private key of the chain's own signing key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_signing_key: Option<String>,

    /// Argon2 parameters for newly created wallets
    #[serde(default)]
    pub kdf: KdfParams,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            wallet_dir: default_wallet_dir(),
            unlock_timeout_secs: None,
            chain_signing_key: None,
            kdf: KdfParams::default(),
        }
    }
}

impl fmt::Debug for KeystoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreConfig")
            .field("wallet_dir", &self.wallet_dir)
            .field("unlock_timeout_secs", &self.unlock_timeout_secs)
            .field(
                "chain_signing_key",
                &self.chain_signing_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("kdf", &self.kdf)
            .finish()
    }
}

impl KeystoreConfig {
    pub fn unlock_timeout(&self) -> Option<Duration> {
        self.unlock_timeout_secs.map(Duration::from_secs)
    }

    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load config from a file, or use defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if Self::exists(path) {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        // May hold the chain signing key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms)
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }
}

/// Get the default keystore directory path
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bth-keystore")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

/// Get the default wallet directory
pub fn default_wallet_dir() -> PathBuf {
    default_data_dir().join("wallets")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = KeystoreConfig {
            wallet_dir: dir.path().join("wallets"),
            unlock_timeout_secs: Some(900),
            chain_signing_key: Some("5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3".into()),
            kdf: KdfParams {
                memory_kib: 1024,
                iterations: 2,
                parallelism: 1,
            },
        };
        config.save(&path).unwrap();

        let loaded = KeystoreConfig::load(&path).unwrap();
        assert_eq!(loaded.wallet_dir, config.wallet_dir);
        assert_eq!(loaded.unlock_timeout(), Some(Duration::from_secs(900)));
        assert_eq!(loaded.chain_signing_key, config.chain_signing_key);
        assert_eq!(loaded.kdf, config.kdf);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: KeystoreConfig = toml::from_str("").unwrap();
        assert_eq!(config.wallet_dir, default_wallet_dir());
        assert_eq!(config.unlock_timeout(), None);
        assert!(config.chain_signing_key.is_none());
        assert_eq!(config.kdf, KdfParams::default());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let config = KeystoreConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(config.chain_signing_key.is_none());
    }

    #[test]
    fn test_load_rejects_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "unlock_timeout_secs = \"soon\"").unwrap();
        assert!(KeystoreConfig::load(&path).is_err());
    }

    #[test]
    fn test_debug_redacts_chain_key() {
        let config = KeystoreConfig {
            chain_signing_key: Some("5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3".into()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("5KQwrP"));
        assert!(debug.contains("REDACTED"));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_config_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        KeystoreConfig::default().save(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
