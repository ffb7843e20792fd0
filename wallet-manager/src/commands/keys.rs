//! Key listing command

use anyhow::Result;
use bth_wallet_manager::WalletManager;

use super::{open_and_unlock, print_warning};

/// Run the keys command
pub fn run(manager: &WalletManager, names: &[String], private: bool) -> Result<()> {
    for name in names {
        open_and_unlock(manager, name)?;
    }

    if private {
        print_warning("Anyone with these private keys can sign as you!");
        println!();
        for (public_key, private_key) in manager.list_keys()? {
            println!("{}  {}", public_key, private_key.to_wif().as_str());
        }
        return Ok(());
    }

    let keys = manager.get_public_keys()?;
    if keys.is_empty() {
        println!("No keys.");
    }
    for public_key in keys {
        println!("{}", public_key);
    }
    Ok(())
}
