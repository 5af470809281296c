//! Pluggy REST API backend
//!
//! Authenticates with a client id/secret pair (`POST /auth`) and sends the
//! returned API key as `X-API-KEY`. The key is cached and refreshed once when
//! the API answers 401/403.
//!
//! # Configuration
//!
//! Environment variables:
//! - `PLUGGY_CLIENT_ID`: Client id (required)
//! - `PLUGGY_CLIENT_SECRET`: Client secret (required)
//! - `PLUGGY_API_URL`: Base URL (default: https://api.pluggy.ai)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::AggregatorConfig;
use crate::error::{Error, Result};
use crate::models::{
    Account, Category, Connector, CreditCardBill, Identity, Investment, Item, TransactionPage,
};
use crate::query::TransactionQuery;

use super::types::{
    AuthRequest, AuthResponse, ConnectTokenRequest, ConnectTokenResponse, ConnectorFilter, Paged,
    WireAccount, WireBill, WireInvestment,
};
use super::AggregatorBackend;

/// Longest error body echoed back in an error message
const MAX_ERROR_BODY: usize = 200;

#[derive(Clone)]
pub struct PluggyBackend {
    http_client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    api_key: Arc<Mutex<Option<String>>>,
}

impl PluggyBackend {
    pub fn new(
        base_url: &str,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            api_key: Arc::new(Mutex::new(None)),
        })
    }

    /// Create from environment variables
    ///
    /// Returns `Ok(None)` when either credential is missing.
    pub fn from_env(config: &AggregatorConfig) -> Result<Option<Self>> {
        let client_id = std::env::var("PLUGGY_CLIENT_ID").ok().filter(|v| !v.is_empty());
        let client_secret = std::env::var("PLUGGY_CLIENT_SECRET")
            .ok()
            .filter(|v| !v.is_empty());

        match (client_id, client_secret) {
            (Some(id), Some(secret)) => {
                Self::new(&config.base_url, &id, &secret, config.timeout).map(Some)
            }
            _ => {
                warn!("Pluggy API credentials are missing (PLUGGY_CLIENT_ID / PLUGGY_CLIENT_SECRET)");
                Ok(None)
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange the client credentials for an API key
    async fn authenticate(&self) -> Result<String> {
        debug!(base_url = %self.base_url, "Authenticating with Pluggy");
        let response = self
            .http_client
            .post(format!("{}/auth", self.base_url))
            .json(&AuthRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let auth: AuthResponse = serde_json::from_str(&body)?;
        auth.api_key
            .ok_or_else(|| Error::MissingField("apiKey".into()))
    }

    /// Cached API key, authenticating on first use
    async fn api_key(&self) -> Result<String> {
        let mut cached = self.api_key.lock().await;
        if let Some(ref key) = *cached {
            return Ok(key.clone());
        }
        let key = self.authenticate().await?;
        *cached = Some(key.clone());
        Ok(key)
    }

    async fn invalidate_api_key(&self) {
        *self.api_key.lock().await = None;
    }

    /// Send an authenticated request and return the raw body
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let mut refreshed = false;

        loop {
            let api_key = self.api_key().await?;
            let mut request = self
                .http_client
                .request(method.clone(), &url)
                .header("X-API-KEY", api_key)
                .query(query);
            if let Some(ref body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) && !refreshed {
                debug!(path = %path, status = %status, "API key rejected, re-authenticating");
                self.invalidate_api_key().await;
                refreshed = true;
                continue;
            }

            let text = response.text().await?;
            if !status.is_success() {
                warn!(path = %path, status = %status, "Pluggy request failed");
                return Err(status_error(status, &text));
            }
            return Ok(text);
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let body = self.send(Method::GET, path, query, None).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Normalize a non-success response into an error
fn status_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                trimmed.chars().take(MAX_ERROR_BODY).collect()
            }
        });
    Error::Aggregator {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl AggregatorBackend for PluggyBackend {
    async fn list_accounts(&self, item_id: &str) -> Result<Vec<Account>> {
        let paged: Paged<WireAccount> = self
            .get_json("/accounts", &[("itemId", item_id.to_string())])
            .await?;
        Ok(paged.results.into_iter().map(Account::from).collect())
    }

    async fn get_account(&self, account_id: &str) -> Result<Account> {
        let wire: WireAccount = self
            .get_json(&format!("/accounts/{}", account_id), &[])
            .await?;
        Ok(wire.into())
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<TransactionPage> {
        debug!(
            account_id = %query.account_id,
            page = query.page,
            page_size = query.page_size,
            "Fetching transactions"
        );
        let paged: Paged<crate::models::Transaction> = self
            .get_json("/transactions", &query.to_query_pairs())
            .await?;
        Ok(paged.into_page(query.page, query.page_size))
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let paged: Paged<Category> = self.get_json("/categories", &[]).await?;
        Ok(paged.results)
    }

    async fn get_item(&self, item_id: &str) -> Result<Item> {
        self.get_json(&format!("/items/{}", item_id), &[]).await
    }

    async fn delete_item(&self, item_id: &str) -> Result<()> {
        self.send(Method::DELETE, &format!("/items/{}", item_id), &[], None)
            .await?;
        Ok(())
    }

    async fn list_connectors(&self, filter: &ConnectorFilter) -> Result<Vec<Connector>> {
        let paged: Paged<Connector> = self
            .get_json("/connectors", &filter.to_query_pairs())
            .await?;
        Ok(paged.results)
    }

    async fn create_connect_token(&self, item_id: Option<&str>) -> Result<String> {
        let body = serde_json::to_value(ConnectTokenRequest { item_id })?;
        let text = self
            .send(Method::POST, "/connect_token", &[], Some(body))
            .await?;
        let token: ConnectTokenResponse = serde_json::from_str(&text)?;
        token
            .access_token
            .ok_or_else(|| Error::MissingField("accessToken".into()))
    }

    async fn list_investments(&self, item_id: &str) -> Result<Vec<Investment>> {
        let paged: Paged<WireInvestment> = self
            .get_json("/investments", &[("itemId", item_id.to_string())])
            .await?;
        Ok(paged.results.into_iter().map(Investment::from).collect())
    }

    async fn list_credit_card_bills(&self, account_id: &str) -> Result<Vec<CreditCardBill>> {
        let paged: Paged<WireBill> = self
            .get_json("/bills", &[("accountId", account_id.to_string())])
            .await?;
        Ok(paged
            .results
            .into_iter()
            .map(|bill| bill.into_bill(account_id))
            .collect())
    }

    async fn get_identity(&self, item_id: &str) -> Result<Identity> {
        self.get_json("/identity", &[("itemId", item_id.to_string())])
            .await
    }

    async fn health_check(&self) -> bool {
        self.api_key().await.is_ok()
    }

    fn name(&self) -> &str {
        "pluggy"
    }
}
