//! Database tests

use super::*;
use crate::models::*;

fn item(id: &str, status: &str, bank: &str) -> Item {
    Item {
        id: id.into(),
        connector: Connector {
            id: 201,
            name: bank.into(),
            institution_url: None,
            image_url: Some(format!("https://cdn.example.com/{}.png", id)),
            primary_color: Some("8A05BE".into()),
            connector_type: Some("PERSONAL_BANK".into()),
            country: Some("BR".into()),
        },
        status: status.into(),
        execution_status: None,
        created_at: None,
        updated_at: None,
    }
}

fn account(id: &str, item_id: &str, name: &str, balance: f64) -> Account {
    Account {
        id: id.into(),
        name: name.into(),
        balance,
        currency: "BRL".into(),
        account_type: AccountType::Bank,
        number: Some("0001".into()),
        subtype: Some("CHECKING_ACCOUNT".into()),
        item_id: Some(item_id.into()),
    }
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_all_accounts().unwrap().is_empty());
    assert!(db.list_connections("user@example.com").unwrap().is_empty());
}

#[test]
fn test_upsert_item_twice_keeps_one_row() {
    let db = Database::in_memory().unwrap();

    db.upsert_item("alice", &item("item-1", "UPDATING", "Banco A"))
        .unwrap();
    db.upsert_item("alice", &item("item-1", "UPDATED", "Banco A2"))
        .unwrap();

    let connections = db.list_connections("alice").unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].status, "UPDATED");
    assert_eq!(connections[0].institution, "Banco A2");
}

#[test]
fn test_upsert_item_never_changes_owner() {
    let db = Database::in_memory().unwrap();
    db.upsert_item("alice", &item("item-1", "ACTIVE", "Banco A"))
        .unwrap();
    db.upsert_item("mallory", &item("item-1", "ACTIVE", "Banco A"))
        .unwrap();

    assert_eq!(db.item_owner("item-1").unwrap().as_deref(), Some("alice"));
    assert!(db.list_connections("mallory").unwrap().is_empty());
}

#[test]
fn test_upsert_accounts_updates_fields() {
    let db = Database::in_memory().unwrap();
    db.upsert_item("alice", &item("item-1", "ACTIVE", "Banco A"))
        .unwrap();

    db.upsert_accounts("item-1", &[account("acc-1", "item-1", "Checking", 10.0)])
        .unwrap();
    db.upsert_accounts("item-1", &[account("acc-1", "item-1", "Main checking", 99.5)])
        .unwrap();

    let accounts = db.list_all_accounts().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "Main checking");
    assert_eq!(accounts[0].balance, 99.5);
    assert_eq!(accounts[0].account_type, AccountType::Bank);
    assert_eq!(accounts[0].item_id.as_deref(), Some("item-1"));
}

#[test]
fn test_save_connection_returns_accounts() {
    let db = Database::in_memory().unwrap();
    let connection = db
        .save_connection(
            "alice",
            &item("item-1", "UPDATED", "Banco A"),
            &[
                account("acc-1", "item-1", "Checking", 10.0),
                account("acc-2", "item-1", "Savings", 20.0),
            ],
        )
        .unwrap();

    assert_eq!(connection.user_id, "alice");
    assert_eq!(connection.accounts.len(), 2);
    assert_eq!(connection.primary_color.as_deref(), Some("8A05BE"));
}

#[test]
fn test_empty_connector_name_uses_default_institution() {
    let db = Database::in_memory().unwrap();
    db.upsert_item("alice", &item("item-1", "ACTIVE", "  ")).unwrap();
    let connection = db.get_connection("item-1").unwrap().unwrap();
    assert_eq!(connection.institution, "Connected Account");
}

#[test]
fn test_only_active_items_listed_for_user() {
    let db = Database::in_memory().unwrap();
    db.save_connection(
        "alice",
        &item("item-ok", "ACTIVE", "Banco A"),
        &[account("acc-1", "item-ok", "Checking", 1.0)],
    )
    .unwrap();
    db.save_connection(
        "alice",
        &item("item-broken", "LOGIN_ERROR", "Banco B"),
        &[account("acc-2", "item-broken", "Card", 2.0)],
    )
    .unwrap();
    db.save_connection(
        "bob",
        &item("item-bob", "ACTIVE", "Banco C"),
        &[account("acc-3", "item-bob", "Savings", 3.0)],
    )
    .unwrap();

    let accounts = db.list_user_accounts("alice").unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].account.id, "acc-1");
    assert_eq!(accounts[0].institution, "Banco A");

    let active = db.list_active_connections("alice").unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "item-ok");

    // Full listing still shows the broken one
    assert_eq!(db.list_connections("alice").unwrap().len(), 2);
    assert_eq!(db.list_all_accounts().unwrap().len(), 3);
}

#[test]
fn test_delete_connection_removes_accounts() {
    let db = Database::in_memory().unwrap();
    db.save_connection(
        "alice",
        &item("item-1", "ACTIVE", "Banco A"),
        &[
            account("acc-1", "item-1", "Checking", 1.0),
            account("acc-2", "item-1", "Card", 2.0),
        ],
    )
    .unwrap();

    // Someone else can't delete it
    assert!(!db.delete_connection("bob", "item-1").unwrap());
    assert_eq!(db.list_all_accounts().unwrap().len(), 2);

    assert!(db.delete_connection("alice", "item-1").unwrap());
    assert!(db.list_connections("alice").unwrap().is_empty());
    assert!(db.list_all_accounts().unwrap().is_empty());
    assert!(!db.delete_connection("alice", "item-1").unwrap());
}

#[test]
fn test_encrypted_database_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saldo.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::new_with_key(path, Some("correct horse")).unwrap();
        db.upsert_item("alice", &item("item-1", "ACTIVE", "Banco A"))
            .unwrap();
    }

    let db = Database::new_with_key(path, Some("correct horse")).unwrap();
    assert_eq!(db.list_connections("alice").unwrap().len(), 1);

    assert!(Database::new_with_key(path, Some("wrong")).is_err());
}
