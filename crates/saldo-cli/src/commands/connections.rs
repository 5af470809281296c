//! Connection commands (sync, list, remove, accounts)

use anyhow::{Context, Result};
use saldo_core::aggregator::{AggregatorBackend, AggregatorClient};
use saldo_core::db::Database;
use saldo_core::models::is_active_status;

use super::{format_amount, truncate};

/// Fetch an item and its accounts from the aggregator and store them
pub async fn cmd_sync(
    db: &Database,
    aggregator: &AggregatorClient,
    user: &str,
    item_id: &str,
) -> Result<()> {
    println!("🔄 Syncing item {}...", item_id);

    if let Some(owner) = db.item_owner(item_id)? {
        if owner != user {
            anyhow::bail!("Item {} belongs to another user", item_id);
        }
    }

    let item = aggregator
        .get_item(item_id)
        .await
        .with_context(|| format!("Failed to fetch item {}", item_id))?;
    let accounts = aggregator
        .list_accounts(item_id)
        .await
        .with_context(|| format!("Failed to fetch accounts of item {}", item_id))?;

    let connection = db.save_connection(user, &item, &accounts)?;

    println!(
        "✅ {} ({}) - {} account(s)",
        connection.institution,
        connection.status,
        connection.accounts.len()
    );
    if !is_active_status(&connection.status) {
        println!("   ⚠️  Item is not active; its accounts are hidden until it recovers");
    }
    Ok(())
}

pub fn cmd_connections_list(db: &Database, user: &str) -> Result<()> {
    let connections = db.list_connections(user)?;

    if connections.is_empty() {
        println!("No connections. Link one with: saldo sync <item-id>");
        return Ok(());
    }

    println!();
    println!(
        "{:<38} {:<24} {:<14} {:>8}",
        "ITEM", "INSTITUTION", "STATUS", "ACCOUNTS"
    );
    println!("{}", "-".repeat(88));
    for connection in &connections {
        let marker = if is_active_status(&connection.status) {
            ""
        } else {
            " ⚠️"
        };
        println!(
            "{:<38} {:<24} {:<14} {:>8}{}",
            truncate(&connection.id, 38),
            truncate(&connection.institution, 24),
            connection.status,
            connection.accounts.len(),
            marker
        );
    }
    println!();
    Ok(())
}

/// Remove a connection locally, and at the aggregator when one is configured
pub async fn cmd_connections_remove(
    db: &Database,
    aggregator: Option<&AggregatorClient>,
    user: &str,
    item_id: &str,
) -> Result<()> {
    if db.item_owner(item_id)?.as_deref() != Some(user) {
        anyhow::bail!("Connection not found: {}", item_id);
    }

    if let Some(aggregator) = aggregator {
        if let Err(e) = aggregator.delete_item(item_id).await {
            tracing::warn!(item_id = %item_id, error = %e, "Failed to delete item at aggregator");
            println!("   ⚠️  Aggregator deletion failed ({}); removing locally", e);
        }
    }

    db.delete_connection(user, item_id)?;
    println!("🗑️  Removed connection {}", item_id);
    Ok(())
}

pub fn cmd_accounts(db: &Database, user: &str) -> Result<()> {
    let accounts = db.list_user_accounts(user)?;

    if accounts.is_empty() {
        println!("No accounts. Link a bank with: saldo sync <item-id>");
        return Ok(());
    }

    println!();
    println!(
        "{:<38} {:<28} {:<20} {:>16}",
        "ID", "NAME", "INSTITUTION", "BALANCE"
    );
    println!("{}", "-".repeat(105));
    for entry in &accounts {
        let account = &entry.account;
        println!(
            "{:<38} {:<28} {:<20} {:>16}",
            truncate(&account.id, 38),
            truncate(&account.name, 28),
            truncate(&entry.institution, 20),
            format_amount(account.balance, &account.currency)
        );
    }
    println!();
    Ok(())
}
