//! Wallet listing command

use anyhow::Result;
use bth_wallet_manager::{storage, WalletManager};

use super::print_warning;

/// Run the list command
pub fn run(manager: &WalletManager) -> Result<()> {
    let dir = manager.dir();
    if !dir.is_dir() {
        print_warning(&format!("No wallet directory at {}", dir.display()));
        return Ok(());
    }

    for name in storage::wallet_names(&dir)? {
        if let Err(e) = manager.open(&name) {
            print_warning(&format!("Skipping {}: {}", name, e));
        }
    }

    let wallets = manager.list_wallets();
    if wallets.is_empty() {
        println!("No wallets found.");
        return Ok(());
    }

    for wallet in wallets {
        println!("{}", wallet);
    }
    Ok(())
}
