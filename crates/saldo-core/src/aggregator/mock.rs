//! In-memory aggregator for tests and offline development
//!
//! Holds items, accounts and transactions in memory and applies the same
//! filtering and paging rules as the real API. Failures and response delays
//! can be injected per account, and every call is recorded.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use crate::error::{Error, Result};
use crate::models::{
    Account, AccountType, Category, Connector, CreditCardBill, Identity, IdentityContact,
    Investment, Item, Transaction, TransactionPage, TransactionType,
};
use crate::query::TransactionQuery;

use super::types::{total_pages_for, ConnectorFilter};
use super::AggregatorBackend;

/// A call received by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    ListAccounts(String),
    GetAccount(String),
    ListTransactions(TransactionQuery),
    ListCategories,
    GetItem(String),
    DeleteItem(String),
    ListConnectors(ConnectorFilter),
    CreateConnectToken(Option<String>),
    ListInvestments(String),
    ListCreditCardBills(String),
    GetIdentity(String),
}

#[derive(Default)]
struct MockState {
    items: Vec<Item>,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    categories: Vec<Category>,
    investments: Vec<Investment>,
    bills: Vec<CreditCardBill>,
    identities: Vec<Identity>,
    unsorted: bool,
    failing_accounts: HashSet<String>,
    fail_categories: bool,
    delays: HashMap<String, VecDeque<Duration>>,
    calls: Vec<MockCall>,
}

/// Mock aggregator backend
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_item(&self, item: Item) -> &Self {
        self.lock().items.push(item);
        self
    }

    pub fn add_account(&self, account: Account) -> &Self {
        self.lock().accounts.push(account);
        self
    }

    pub fn add_transactions(&self, transactions: impl IntoIterator<Item = Transaction>) -> &Self {
        self.lock().transactions.extend(transactions);
        self
    }

    pub fn add_category(&self, category: Category) -> &Self {
        self.lock().categories.push(category);
        self
    }

    pub fn add_investment(&self, investment: Investment) -> &Self {
        self.lock().investments.push(investment);
        self
    }

    pub fn add_bill(&self, bill: CreditCardBill) -> &Self {
        self.lock().bills.push(bill);
        self
    }

    pub fn add_identity(&self, identity: Identity) -> &Self {
        self.lock().identities.push(identity);
        self
    }

    /// Return transactions in insertion order instead of newest first
    pub fn unsorted(&self) -> &Self {
        self.lock().unsorted = true;
        self
    }

    /// Make transaction fetches for `account_id` fail
    pub fn fail_account(&self, account_id: &str) -> &Self {
        self.lock().failing_accounts.insert(account_id.to_string());
        self
    }

    pub fn recover_account(&self, account_id: &str) -> &Self {
        self.lock().failing_accounts.remove(account_id);
        self
    }

    /// Make category fetches fail
    pub fn fail_categories(&self) -> &Self {
        self.lock().fail_categories = true;
        self
    }

    /// Delay the next transaction fetch for `account_id`
    ///
    /// Delays queue up: each fetch consumes one.
    pub fn delay_next(&self, account_id: &str, delay: Duration) -> &Self {
        self.lock()
            .delays
            .entry(account_id.to_string())
            .or_default()
            .push_back(delay);
        self
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Transaction queries received so far
    pub fn transaction_queries(&self) -> Vec<TransactionQuery> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::ListTransactions(q) => Some(q.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn record(&self, call: MockCall) {
        self.lock().calls.push(call);
    }

    /// Mock preloaded with one bank connection, two accounts and a few weeks
    /// of activity ending now
    pub fn with_sample_data() -> Self {
        let mock = Self::new();
        let now = Utc::now();

        mock.add_item(Item {
            id: "item-demo".into(),
            connector: Connector {
                id: 201,
                name: "Banco Exemplo".into(),
                institution_url: Some("https://exemplo.com.br".into()),
                image_url: None,
                primary_color: Some("8A05BE".into()),
                connector_type: Some("PERSONAL_BANK".into()),
                country: Some("BR".into()),
            },
            status: "UPDATED".into(),
            execution_status: Some("SUCCESS".into()),
            created_at: Some(now - ChronoDuration::days(90)),
            updated_at: Some(now),
        });

        mock.add_account(Account {
            id: "acc-checking".into(),
            name: "Conta Corrente".into(),
            balance: 4210.55,
            currency: "BRL".into(),
            account_type: AccountType::Bank,
            number: Some("0001/12345-0".into()),
            subtype: Some("CHECKING_ACCOUNT".into()),
            item_id: Some("item-demo".into()),
        });
        mock.add_account(Account {
            id: "acc-card".into(),
            name: "Cartão Platinum".into(),
            balance: -1290.4,
            currency: "BRL".into(),
            account_type: AccountType::Credit,
            number: Some("4321".into()),
            subtype: Some("CREDIT_CARD".into()),
            item_id: Some("item-demo".into()),
        });

        for (id, description, translated, parent) in [
            ("01000000", "Income", "Renda", None),
            ("05000000", "Transfers", "Transferências", None),
            ("08000000", "Shopping", "Compras", None),
            ("08010000", "Online shopping", "Compras online", Some("08000000")),
            ("09000000", "Groceries", "Supermercado", Some("08000000")),
            ("11000000", "Transportation", "Transporte", None),
            ("12000000", "Services", "Serviços", None),
        ] {
            mock.add_category(Category {
                id: id.into(),
                description: description.into(),
                description_translated: Some(translated.into()),
                parent_id: parent.map(String::from),
                parent_description: parent.map(|_| "Shopping".to_string()),
            });
        }

        let checking = [
            ("Salário", 6500.0, "01000000", "Income"),
            ("Supermercado Pão Doce", -342.18, "09000000", "Groceries"),
            ("PIX enviado - Aluguel", -2100.0, "05000000", "Transfers"),
            ("Uber *Trip", -27.9, "11000000", "Transportation"),
            ("Conta de luz", -189.33, "12000000", "Services"),
            ("PIX recebido", 250.0, "05000000", "Transfers"),
        ];
        let card = [
            ("Amazon Marketplace", -159.9, "08010000", "Online shopping"),
            ("Netflix.com", -55.9, "12000000", "Services"),
            ("Posto Shell", -210.0, "11000000", "Transportation"),
            ("Mercado Livre", -89.0, "08010000", "Online shopping"),
            ("Pagamento de fatura", 1500.0, "05000000", "Transfers"),
        ];

        let mut transactions = Vec::new();
        for (account_id, rows) in [("acc-checking", &checking[..]), ("acc-card", &card[..])] {
            for i in 0..30usize {
                let (description, amount, category_id, category) = rows[i % rows.len()];
                transactions.push(Transaction {
                    id: format!("{}-tx-{:03}", account_id, i),
                    description: description.to_string(),
                    description_raw: Some(description.to_uppercase()),
                    transaction_type: if amount >= 0.0 {
                        TransactionType::Credit
                    } else {
                        TransactionType::Debit
                    },
                    amount,
                    date: now - ChronoDuration::hours((i as i64) * 26 + 1),
                    category: Some(category.to_string()),
                    category_id: Some(category_id.to_string()),
                    account_id: account_id.to_string(),
                    account_name: None,
                    currency_code: Some("BRL".into()),
                    status: Some("POSTED".into()),
                    balance: None,
                    operation_type: None,
                    credit_card_metadata: None,
                    payment_data: None,
                    merchant: None,
                });
            }
        }
        mock.add_transactions(transactions);

        mock.add_investment(Investment {
            id: "inv-cdb".into(),
            name: "CDB Banco Exemplo 110% CDI".into(),
            number: None,
            balance: 15230.0,
            amount: Some(15000.0),
            investment_type: "FIXED_INCOME".into(),
            date: Some(now - ChronoDuration::days(60)),
            value: Some(1.0153),
            quantity: Some(15000.0),
            item_id: "item-demo".into(),
        });

        mock.add_bill(CreditCardBill {
            id: "bill-demo".into(),
            account_id: "acc-card".into(),
            name: "Fatura Cartão Platinum".into(),
            status: "CLOSED".into(),
            due_date: (now + ChronoDuration::days(10)).date_naive().to_string(),
            close_date: (now - ChronoDuration::days(1)).date_naive().to_string(),
            amount: 1290.4,
            currency_code: "BRL".into(),
            period: now.format("%Y-%m").to_string(),
        });

        mock.add_identity(Identity {
            id: "identity-demo".into(),
            item_id: Some("item-demo".into()),
            full_name: Some("Maria Souza".into()),
            document: Some("123.456.789-00".into()),
            document_type: Some("CPF".into()),
            emails: vec![IdentityContact {
                value: "maria@example.com".into(),
                contact_type: Some("Personal".into()),
            }],
            ..Identity::default()
        });

        mock
    }
}

fn not_found(what: &str, id: &str) -> Error {
    Error::Aggregator {
        status: 404,
        message: format!("{} {} not found", what, id),
    }
}

fn matches(tx: &Transaction, query: &TransactionQuery) -> bool {
    if tx.account_id != query.account_id {
        return false;
    }
    if let Some(ref search) = query.search {
        if !tx
            .description
            .to_lowercase()
            .contains(&search.to_lowercase())
        {
            return false;
        }
    }
    if let Some(ref category_id) = query.category_id {
        if tx.category_id.as_ref() != Some(category_id) {
            return false;
        }
    }
    if let Some(transaction_type) = query.transaction_type {
        if tx.transaction_type != transaction_type {
            return false;
        }
    }
    let day = tx.date.date_naive();
    if query.from.is_some_and(|from| day < from) {
        return false;
    }
    if query.to.is_some_and(|to| day > to) {
        return false;
    }
    true
}

#[async_trait]
impl AggregatorBackend for MockBackend {
    async fn list_accounts(&self, item_id: &str) -> Result<Vec<Account>> {
        self.record(MockCall::ListAccounts(item_id.to_string()));
        Ok(self
            .lock()
            .accounts
            .iter()
            .filter(|a| a.item_id.as_deref() == Some(item_id))
            .cloned()
            .collect())
    }

    async fn get_account(&self, account_id: &str) -> Result<Account> {
        self.record(MockCall::GetAccount(account_id.to_string()));
        self.lock()
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .cloned()
            .ok_or_else(|| not_found("Account", account_id))
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<TransactionPage> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(MockCall::ListTransactions(query.clone()));
            state
                .delays
                .get_mut(&query.account_id)
                .and_then(VecDeque::pop_front)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.lock();
        if state.failing_accounts.contains(&query.account_id) {
            return Err(Error::Aggregator {
                status: 500,
                message: format!("Failed to fetch transactions for {}", query.account_id),
            });
        }

        let mut filtered: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|tx| matches(tx, query))
            .cloned()
            .collect();
        if !state.unsorted {
            filtered.sort_by(|a, b| b.date.cmp(&a.date));
        }

        let total = filtered.len() as u64;
        let page_size = query.page_size.max(1);
        let start = (query.page.max(1) as usize - 1) * page_size as usize;
        let transactions = filtered
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(TransactionPage {
            transactions,
            total,
            total_pages: total_pages_for(total, page_size),
            page: query.page.max(1),
        })
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.record(MockCall::ListCategories);
        let state = self.lock();
        if state.fail_categories {
            return Err(Error::Aggregator {
                status: 503,
                message: "Categories unavailable".into(),
            });
        }
        Ok(state.categories.clone())
    }

    async fn get_item(&self, item_id: &str) -> Result<Item> {
        self.record(MockCall::GetItem(item_id.to_string()));
        self.lock()
            .items
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or_else(|| not_found("Item", item_id))
    }

    async fn delete_item(&self, item_id: &str) -> Result<()> {
        self.record(MockCall::DeleteItem(item_id.to_string()));
        let mut state = self.lock();
        let before = state.items.len();
        state.items.retain(|i| i.id != item_id);
        if state.items.len() == before {
            return Err(not_found("Item", item_id));
        }
        Ok(())
    }

    async fn list_connectors(&self, filter: &ConnectorFilter) -> Result<Vec<Connector>> {
        self.record(MockCall::ListConnectors(filter.clone()));
        let name = filter.name.as_ref().map(|n| n.to_lowercase());
        let mut connectors: Vec<Connector> = Vec::new();
        for item in &self.lock().items {
            let connector = &item.connector;
            if connectors.iter().any(|c| c.id == connector.id) {
                continue;
            }
            if let Some(ref name) = name {
                if !connector.name.to_lowercase().contains(name) {
                    continue;
                }
            }
            if !filter.countries.is_empty()
                && !connector
                    .country
                    .as_ref()
                    .is_some_and(|c| filter.countries.contains(c))
            {
                continue;
            }
            if !filter.types.is_empty()
                && !connector
                    .connector_type
                    .as_ref()
                    .is_some_and(|t| filter.types.contains(t))
            {
                continue;
            }
            connectors.push(connector.clone());
        }
        Ok(connectors)
    }

    async fn create_connect_token(&self, item_id: Option<&str>) -> Result<String> {
        self.record(MockCall::CreateConnectToken(item_id.map(String::from)));
        Ok(match item_id {
            Some(id) => format!("mock-connect-token-{}", id),
            None => "mock-connect-token".to_string(),
        })
    }

    async fn list_investments(&self, item_id: &str) -> Result<Vec<Investment>> {
        self.record(MockCall::ListInvestments(item_id.to_string()));
        Ok(self
            .lock()
            .investments
            .iter()
            .filter(|i| i.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn list_credit_card_bills(&self, account_id: &str) -> Result<Vec<CreditCardBill>> {
        self.record(MockCall::ListCreditCardBills(account_id.to_string()));
        Ok(self
            .lock()
            .bills
            .iter()
            .filter(|b| b.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_identity(&self, item_id: &str) -> Result<Identity> {
        self.record(MockCall::GetIdentity(item_id.to_string()));
        self.lock()
            .identities
            .iter()
            .find(|i| i.item_id.as_deref() == Some(item_id))
            .cloned()
            .ok_or_else(|| not_found("Identity", item_id))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "mock"
    }
}
