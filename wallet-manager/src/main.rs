//! Botho Keystore CLI
//!
//! Create wallets, manage their keys, and sign transactions offline.

use anyhow::Result;
use bth_wallet_manager::{config, KeystoreConfig, WalletManager};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "bth-keystore")]
#[command(about = "Botho keystore - encrypted signing keys for node operators")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Wallet directory (overrides the config file)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet and print its password
    Create {
        /// Wallet name
        name: String,
    },

    /// List wallet files in the wallet directory
    List,

    /// Import a WIF private key into a wallet
    Import {
        /// Wallet name
        name: String,
    },

    /// Generate a new key inside a wallet
    CreateKey {
        /// Wallet name
        name: String,
    },

    /// Remove a key from a wallet
    RemoveKey {
        /// Wallet name
        name: String,

        /// Public key to remove
        public_key: String,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show the public keys of one or more wallets
    Keys {
        /// Wallet names
        #[arg(required = true)]
        names: Vec<String>,

        /// Also show private keys (WIF)
        #[arg(long)]
        private: bool,
    },

    /// Sign a JSON transaction file
    Sign {
        /// Transaction file
        transaction: PathBuf,

        /// Wallets to unlock for signing
        #[arg(short, long = "wallet", required = true)]
        wallets: Vec<String>,

        /// Public keys that must sign
        #[arg(short, long = "key", required = true)]
        keys: Vec<String>,

        /// Chain id (64 hex characters)
        #[arg(long)]
        chain_id: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let mut keystore_config = KeystoreConfig::load_or_default(&config_path)?;
    if let Some(dir) = cli.dir {
        keystore_config.wallet_dir = dir;
    }
    let manager = WalletManager::from_config(&keystore_config)?;

    match cli.command {
        Commands::Create { name } => commands::create::run(&manager, &name),
        Commands::List => commands::list::run(&manager),
        Commands::Import { name } => commands::import::run(&manager, &name),
        Commands::CreateKey { name } => commands::create_key::run(&manager, &name),
        Commands::RemoveKey {
            name,
            public_key,
            yes,
        } => commands::remove_key::run(&manager, &name, &public_key, yes),
        Commands::Keys { names, private } => commands::keys::run(&manager, &names, private),
        Commands::Sign {
            transaction,
            wallets,
            keys,
            chain_id,
            output,
        } => commands::sign::run(&manager, &transaction, &wallets, &keys, &chain_id, output),
    }
}
