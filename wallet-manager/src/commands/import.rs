//! Private key import command

use anyhow::Result;
use bth_wallet_manager::{WalletError, WalletManager};

use super::{open_and_unlock, print_error, print_success, prompt_password};

/// Run the import command
pub fn run(manager: &WalletManager, name: &str) -> Result<()> {
    open_and_unlock(manager, name)?;

    let wif = prompt_password("Private key (WIF): ")?;
    match manager.import_key(name, wif.trim()) {
        Ok(public_key) => {
            print_success(&format!("Imported key {}", public_key));
            Ok(())
        }
        Err(e @ WalletError::InvalidKeyFormat(_)) => {
            print_error("Not a valid WIF private key");
            Err(e.into())
        }
        Err(e) => {
            print_error(&e.to_string());
            Err(e.into())
        }
    }
}
