//! Transaction signing command

use anyhow::{Context, Result};
use bth_wallet_manager::{ChainId, PublicKey, SignedTransaction, WalletManager};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::{open_and_unlock, print_error, print_success};

/// Run the sign command
pub fn run(
    manager: &WalletManager,
    transaction: &Path,
    wallets: &[String],
    keys: &[String],
    chain_id: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let chain_id: ChainId = chain_id.parse().context("Invalid chain id")?;
    let public_keys = keys
        .iter()
        .map(|key| {
            key.parse::<PublicKey>()
                .with_context(|| format!("Invalid public key: {}", key))
        })
        .collect::<Result<BTreeSet<_>>>()?;

    let contents = fs::read_to_string(transaction)
        .with_context(|| format!("Failed to read transaction from {}", transaction.display()))?;
    let txn: SignedTransaction = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse transaction from {}", transaction.display()))?;

    for name in wallets {
        open_and_unlock(manager, name)?;
    }

    let signed = match manager.sign_transaction(txn, &public_keys, &chain_id) {
        Ok(signed) => signed,
        Err(e) => {
            print_error(&e.to_string());
            return Err(e.into());
        }
    };

    let json = serde_json::to_string_pretty(&signed)?;
    match output {
        Some(path) => {
            fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!(
                "Signed with {} key(s), written to {}",
                public_keys.len(),
                path.display()
            ));
        }
        None => println!("{}", json),
    }
    Ok(())
}
