//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` / `open_aggregator` - Configuration and aggregator setup
//! - `build_coordinator` - Transaction coordinator over the user's stored accounts
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use saldo_core::aggregator::AggregatorClient;
use saldo_core::config::{SaldoConfig, ViewConfig};
use saldo_core::coordinator::TransactionCoordinator;
use saldo_core::db::Database;
use saldo_core::models::Account;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load configuration from an explicit file, or the default locations
pub fn load_config(path: Option<&Path>) -> Result<SaldoConfig> {
    match path {
        Some(path) => SaldoConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => SaldoConfig::load().context("Failed to load config"),
    }
}

/// Create the aggregator client selected by the environment
pub fn open_aggregator(config: &SaldoConfig) -> Result<AggregatorClient> {
    match AggregatorClient::from_env(&config.aggregator)? {
        Some(client) => Ok(client),
        None => bail!(
            "Aggregator not configured. Set PLUGGY_CLIENT_ID and PLUGGY_CLIENT_SECRET, \
             or SALDO_AGGREGATOR=mock for sample data"
        ),
    }
}

/// Coordinator over the accounts stored for a user
pub fn coordinator_for(
    db: &Database,
    aggregator: AggregatorClient,
    view: ViewConfig,
    user: &str,
) -> Result<TransactionCoordinator> {
    let accounts: Vec<Account> = db
        .list_user_accounts(user)
        .context("Failed to list accounts")?
        .into_iter()
        .map(|a| a.account)
        .collect();

    let coordinator = TransactionCoordinator::new(aggregator, view);
    coordinator.set_accounts(accounts);
    Ok(coordinator)
}

pub fn build_coordinator(
    db: &Database,
    config: &SaldoConfig,
    user: &str,
) -> Result<TransactionCoordinator> {
    let aggregator = open_aggregator(config)?;
    coordinator_for(db, aggregator, config.view.clone(), user)
}

/// Find an account by id, or by case-insensitive name
pub fn resolve_account(coordinator: &TransactionCoordinator, key: &str) -> Result<Account> {
    let accounts = coordinator.accounts();
    if accounts.is_empty() {
        bail!("No accounts linked. Run `saldo sync <item-id>` first");
    }

    let key = key.trim();
    if let Some(account) = accounts.iter().find(|a| a.id == key) {
        return Ok(account.clone());
    }
    let by_name: Vec<&Account> = accounts
        .iter()
        .filter(|a| a.name.eq_ignore_ascii_case(key))
        .collect();
    match by_name.as_slice() {
        [account] => Ok((*account).clone()),
        [] => bail!("Account not found: {}", key),
        _ => bail!("Several accounts are named '{}'; use the account id", key),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Link a bank: saldo sync <item-id>");
    println!("  2. Browse transactions: saldo browse");
    println!("  3. Start web UI: saldo serve");

    Ok(())
}
