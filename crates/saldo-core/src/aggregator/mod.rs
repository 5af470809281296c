//! Open-banking aggregator access
//!
//! # Architecture
//!
//! - `AggregatorBackend` trait: the operations Saldo needs from the aggregator
//! - `AggregatorClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `PluggyBackend` (REST API), `MockBackend` (in-memory)
//!
//! # Configuration
//!
//! Environment variables:
//! - `SALDO_AGGREGATOR`: Backend to use (pluggy, mock). Default: pluggy
//! - `PLUGGY_CLIENT_ID` / `PLUGGY_CLIENT_SECRET`: API credentials (required for pluggy)
//! - `PLUGGY_API_URL`: API base URL (default: https://api.pluggy.ai)

mod mock;
mod pluggy;
pub mod types;

pub use mock::{MockBackend, MockCall};
pub use pluggy::PluggyBackend;
pub use types::ConnectorFilter;

use async_trait::async_trait;

use crate::config::AggregatorConfig;
use crate::error::Result;
use crate::models::{
    Account, Category, Connector, CreditCardBill, Identity, Investment, Item, TransactionPage,
};
use crate::query::TransactionQuery;

/// Operations consumed from the aggregator
#[async_trait]
pub trait AggregatorBackend: Send + Sync {
    /// List the accounts of one item (connection)
    async fn list_accounts(&self, item_id: &str) -> Result<Vec<Account>>;

    /// Fetch a single account
    async fn get_account(&self, account_id: &str) -> Result<Account>;

    /// List one page of an account's transactions
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<TransactionPage>;

    /// List the category catalogue
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn get_item(&self, item_id: &str) -> Result<Item>;

    async fn delete_item(&self, item_id: &str) -> Result<()>;

    async fn list_connectors(&self, filter: &ConnectorFilter) -> Result<Vec<Connector>>;

    /// Create a short-lived token for the connect widget
    async fn create_connect_token(&self, item_id: Option<&str>) -> Result<String>;

    async fn list_investments(&self, item_id: &str) -> Result<Vec<Investment>>;

    /// List the statements of a credit card account
    async fn list_credit_card_bills(&self, account_id: &str) -> Result<Vec<CreditCardBill>>;

    /// Fetch the account holder behind an item
    async fn get_identity(&self, item_id: &str) -> Result<Identity>;

    /// Check if the backend is reachable with the configured credentials
    async fn health_check(&self) -> bool;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}

/// Concrete aggregator client enum
#[derive(Clone)]
pub enum AggregatorClient {
    Pluggy(PluggyBackend),
    Mock(MockBackend),
}

impl AggregatorClient {
    /// Create a client from environment variables
    ///
    /// Returns `Ok(None)` when the pluggy backend is selected but credentials
    /// are not set.
    pub fn from_env(config: &AggregatorConfig) -> Result<Option<Self>> {
        let backend = std::env::var("SALDO_AGGREGATOR").unwrap_or_else(|_| "pluggy".to_string());

        match backend.to_lowercase().as_str() {
            "mock" => Ok(Some(AggregatorClient::Mock(MockBackend::with_sample_data()))),
            "pluggy" => Ok(PluggyBackend::from_env(config)?.map(AggregatorClient::Pluggy)),
            _ => {
                tracing::warn!(backend = %backend, "Unknown SALDO_AGGREGATOR, falling back to pluggy");
                Ok(PluggyBackend::from_env(config)?.map(AggregatorClient::Pluggy))
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock(backend: MockBackend) -> Self {
        AggregatorClient::Mock(backend)
    }
}

#[async_trait]
impl AggregatorBackend for AggregatorClient {
    async fn list_accounts(&self, item_id: &str) -> Result<Vec<Account>> {
        match self {
            AggregatorClient::Pluggy(b) => b.list_accounts(item_id).await,
            AggregatorClient::Mock(b) => b.list_accounts(item_id).await,
        }
    }

    async fn get_account(&self, account_id: &str) -> Result<Account> {
        match self {
            AggregatorClient::Pluggy(b) => b.get_account(account_id).await,
            AggregatorClient::Mock(b) => b.get_account(account_id).await,
        }
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<TransactionPage> {
        match self {
            AggregatorClient::Pluggy(b) => b.list_transactions(query).await,
            AggregatorClient::Mock(b) => b.list_transactions(query).await,
        }
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        match self {
            AggregatorClient::Pluggy(b) => b.list_categories().await,
            AggregatorClient::Mock(b) => b.list_categories().await,
        }
    }

    async fn get_item(&self, item_id: &str) -> Result<Item> {
        match self {
            AggregatorClient::Pluggy(b) => b.get_item(item_id).await,
            AggregatorClient::Mock(b) => b.get_item(item_id).await,
        }
    }

    async fn delete_item(&self, item_id: &str) -> Result<()> {
        match self {
            AggregatorClient::Pluggy(b) => b.delete_item(item_id).await,
            AggregatorClient::Mock(b) => b.delete_item(item_id).await,
        }
    }

    async fn list_connectors(&self, filter: &ConnectorFilter) -> Result<Vec<Connector>> {
        match self {
            AggregatorClient::Pluggy(b) => b.list_connectors(filter).await,
            AggregatorClient::Mock(b) => b.list_connectors(filter).await,
        }
    }

    async fn create_connect_token(&self, item_id: Option<&str>) -> Result<String> {
        match self {
            AggregatorClient::Pluggy(b) => b.create_connect_token(item_id).await,
            AggregatorClient::Mock(b) => b.create_connect_token(item_id).await,
        }
    }

    async fn list_investments(&self, item_id: &str) -> Result<Vec<Investment>> {
        match self {
            AggregatorClient::Pluggy(b) => b.list_investments(item_id).await,
            AggregatorClient::Mock(b) => b.list_investments(item_id).await,
        }
    }

    async fn list_credit_card_bills(&self, account_id: &str) -> Result<Vec<CreditCardBill>> {
        match self {
            AggregatorClient::Pluggy(b) => b.list_credit_card_bills(account_id).await,
            AggregatorClient::Mock(b) => b.list_credit_card_bills(account_id).await,
        }
    }

    async fn get_identity(&self, item_id: &str) -> Result<Identity> {
        match self {
            AggregatorClient::Pluggy(b) => b.get_identity(item_id).await,
            AggregatorClient::Mock(b) => b.get_identity(item_id).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AggregatorClient::Pluggy(b) => b.health_check().await,
            AggregatorClient::Mock(b) => b.health_check().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            AggregatorClient::Pluggy(b) => b.name(),
            AggregatorClient::Mock(b) => b.name(),
        }
    }
}
