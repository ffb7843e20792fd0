//! Key removal command

use anyhow::{Context, Result};
use bth_wallet_manager::{PublicKey, WalletManager};

use super::{print_error, print_success, print_warning, prompt_confirm, prompt_password};

/// Run the remove-key command
pub fn run(manager: &WalletManager, name: &str, public_key: &str, yes: bool) -> Result<()> {
    let public_key: PublicKey = public_key.parse().context("Invalid public key")?;

    manager.open(name)?;
    let password = prompt_password(&format!("Password for wallet '{}': ", name))?;
    manager.unlock(name, &password)?;

    if !yes {
        print_warning("A removed key is gone for good unless you have a backup.");
        if !prompt_confirm(&format!("Remove {} from '{}'?", public_key, name))? {
            println!("Aborted.");
            return Ok(());
        }
    }

    match manager.remove_key(name, &password, &public_key) {
        Ok(()) => {
            print_success(&format!("Removed key {}", public_key));
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            Err(e.into())
        }
    }
}
