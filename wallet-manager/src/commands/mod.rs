//! CLI Commands
//!
//! Each command runs against a fresh [`WalletManager`]: wallets are opened
//! from the wallet directory, unlocked with a prompted password, and locked
//! again when the process exits.

pub mod create;
pub mod create_key;
pub mod import;
pub mod keys;
pub mod list;
pub mod remove_key;
pub mod sign;

use anyhow::Result;
use bth_wallet_manager::{WalletError, WalletManager};
use std::io::{self, Write};
use zeroize::Zeroizing;

/// Prompt for password input (hidden)
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let password = Zeroizing::new(rpassword::read_password()?);
    Ok(password)
}

/// Prompt for confirmation
pub fn prompt_confirm(message: &str) -> Result<bool> {
    print!("{} [y/N]: ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y") || input.trim().eq_ignore_ascii_case("yes"))
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}

/// Open a wallet and unlock it with a prompted password.
pub fn open_and_unlock(manager: &WalletManager, name: &str) -> Result<()> {
    if let Err(e) = manager.open(name) {
        print_error(&e.to_string());
        return Err(e.into());
    }

    let password = prompt_password(&format!("Password for wallet '{}': ", name))?;
    match manager.unlock(name, &password) {
        Ok(()) => Ok(()),
        Err(e @ WalletError::InvalidPassword(_)) => {
            print_error("Incorrect password");
            Err(e.into())
        }
        Err(e) => {
            print_error(&e.to_string());
            Err(e.into())
        }
    }
}
