//! Key generation command

use anyhow::Result;
use bth_wallet_manager::WalletManager;

use super::{open_and_unlock, print_success};

/// Run the create-key command
pub fn run(manager: &WalletManager, name: &str) -> Result<()> {
    open_and_unlock(manager, name)?;

    let public_key = manager.create_key(name)?;
    print_success(&format!("Created key {}", public_key));
    Ok(())
}
