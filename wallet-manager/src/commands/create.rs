//! Wallet creation command

use anyhow::Result;
use bth_wallet_manager::WalletManager;

use super::{print_error, print_success, print_warning};

/// Run the create command
pub fn run(manager: &WalletManager, name: &str) -> Result<()> {
    let password = match manager.create(name) {
        Ok(password) => password,
        Err(e) => {
            print_error(&e.to_string());
            return Err(e.into());
        }
    };

    print_success(&format!("Created wallet '{}'", name));
    println!();
    print_warning("Save this password now. It cannot be recovered or shown again.");
    println!();
    println!("  {}", password.as_str());
    println!();

    Ok(())
}
