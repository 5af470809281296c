//! Connection (item) and account operations

use rusqlite::{params, Connection as SqliteConnection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{
    Account, AccountType, Connection, Item, UserAccount, ACTIVE_ITEM_STATUSES,
};

/// Institution name stored when the connector has none
const DEFAULT_INSTITUTION: &str = "Connected Account";

const ACCOUNT_COLUMNS: &str =
    "a.id, a.name, a.balance, a.currency_code, a.account_type, a.number, a.subtype, a.item_id";

fn row_to_account(row: &Row) -> rusqlite::Result<Account> {
    let account_type: String = row.get(4)?;
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        balance: row.get(2)?,
        currency: row.get(3)?,
        account_type: account_type.parse().unwrap_or(AccountType::Other),
        number: row.get(5)?,
        subtype: row.get(6)?,
        item_id: row.get(7)?,
    })
}

/// SQL `IN (...)` list of the statuses counted as active
fn active_status_list() -> String {
    ACTIVE_ITEM_STATUSES
        .iter()
        .map(|s| format!("'{}'", s))
        .collect::<Vec<_>>()
        .join(", ")
}

fn accounts_for_item(conn: &SqliteConnection, item_id: &str) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM accounts a WHERE a.item_id = ? ORDER BY a.name",
        ACCOUNT_COLUMNS
    ))?;
    let accounts = stmt
        .query_map(params![item_id], row_to_account)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(accounts)
}

fn load_connections(
    conn: &SqliteConnection,
    where_clause: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Connection>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, user_id, institution, status, image_url, primary_color, created_at, updated_at
         FROM items WHERE {} ORDER BY created_at DESC, rowid DESC",
        where_clause
    ))?;

    let mut connections = stmt
        .query_map(args, |row| {
            let created_at: String = row.get(6)?;
            let updated_at: String = row.get(7)?;
            Ok(Connection {
                id: row.get(0)?,
                user_id: row.get(1)?,
                institution: row.get(2)?,
                status: row.get(3)?,
                image_url: row.get(4)?,
                primary_color: row.get(5)?,
                accounts: Vec::new(),
                created_at: parse_datetime(&created_at),
                updated_at: parse_datetime(&updated_at),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for connection in &mut connections {
        connection.accounts = accounts_for_item(conn, &connection.id)?;
    }
    Ok(connections)
}

impl Database {
    /// Insert or update an item for a user
    ///
    /// On conflict the status and institution details are refreshed; the
    /// owning user never changes.
    pub fn upsert_item(&self, user_id: &str, item: &Item) -> Result<()> {
        let conn = self.conn()?;
        let institution = if item.connector.name.trim().is_empty() {
            DEFAULT_INSTITUTION
        } else {
            item.connector.name.as_str()
        };

        conn.execute(
            "INSERT INTO items (id, user_id, institution, status, image_url, primary_color)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                institution = excluded.institution,
                status = excluded.status,
                image_url = excluded.image_url,
                primary_color = excluded.primary_color,
                updated_at = CURRENT_TIMESTAMP",
            params![
                item.id,
                user_id,
                institution,
                item.status,
                item.connector.image_url,
                item.connector.primary_color,
            ],
        )?;
        debug!(item_id = %item.id, status = %item.status, "Item upserted");
        Ok(())
    }

    /// Insert or update the accounts of an item
    pub fn upsert_accounts(&self, item_id: &str, accounts: &[Account]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO accounts (id, item_id, name, number, balance, currency_code, account_type, subtype)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    number = excluded.number,
                    balance = excluded.balance,
                    currency_code = excluded.currency_code,
                    account_type = excluded.account_type,
                    subtype = excluded.subtype,
                    updated_at = CURRENT_TIMESTAMP",
            )?;
            for account in accounts {
                stmt.execute(params![
                    account.id,
                    item_id,
                    account.name,
                    account.number,
                    account.balance,
                    account.currency,
                    account.account_type.as_str(),
                    account.subtype,
                ])?;
            }
        }
        tx.commit()?;
        Ok(accounts.len())
    }

    /// Store an item and its accounts, returning the stored connection
    pub fn save_connection(
        &self,
        user_id: &str,
        item: &Item,
        accounts: &[Account],
    ) -> Result<Connection> {
        self.upsert_item(user_id, item)?;
        let count = self.upsert_accounts(&item.id, accounts)?;
        info!(item_id = %item.id, accounts = count, "Connection saved");

        self.get_connection(&item.id)?
            .ok_or_else(|| crate::error::Error::NotFound(format!("Item {}", item.id)))
    }

    pub fn get_connection(&self, item_id: &str) -> Result<Option<Connection>> {
        let conn = self.conn()?;
        let mut found = load_connections(&conn, "id = ?", &[&item_id])?;
        Ok(found.pop())
    }

    /// Every connection of a user regardless of status, newest first
    pub fn list_connections(&self, user_id: &str) -> Result<Vec<Connection>> {
        let conn = self.conn()?;
        load_connections(&conn, "user_id = ?", &[&user_id])
    }

    /// Connections of a user whose item is active
    pub fn list_active_connections(&self, user_id: &str) -> Result<Vec<Connection>> {
        let conn = self.conn()?;
        let clause = format!("user_id = ? AND status IN ({})", active_status_list());
        load_connections(&conn, &clause, &[&user_id])
    }

    /// Accounts under a user's active connections
    pub fn list_user_accounts(&self, user_id: &str) -> Result<Vec<UserAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, i.institution FROM accounts a
             JOIN items i ON i.id = a.item_id
             WHERE i.user_id = ? AND i.status IN ({})
             ORDER BY i.institution, a.name",
            ACCOUNT_COLUMNS,
            active_status_list()
        ))?;

        let accounts = stmt
            .query_map(params![user_id], |row| {
                Ok(UserAccount {
                    account: row_to_account(row)?,
                    institution: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Every stored account
    pub fn list_all_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts a ORDER BY a.name",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Owner of an item, if stored
    pub fn item_owner(&self, item_id: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let owner = conn
            .query_row(
                "SELECT user_id FROM items WHERE id = ?",
                params![item_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    /// Delete a user's connection and its accounts
    ///
    /// Returns false when the user has no such connection.
    pub fn delete_connection(&self, user_id: &str, item_id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let owned: bool = tx
            .query_row(
                "SELECT COUNT(*) FROM items WHERE id = ? AND user_id = ?",
                params![item_id, user_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)?;
        if !owned {
            return Ok(false);
        }

        let accounts = tx.execute("DELETE FROM accounts WHERE item_id = ?", params![item_id])?;
        tx.execute(
            "DELETE FROM items WHERE id = ? AND user_id = ?",
            params![item_id, user_id],
        )?;
        tx.commit()?;

        info!(item_id = %item_id, accounts, "Connection deleted");
        Ok(true)
    }
}
