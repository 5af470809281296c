//! Aggregator wire types
//!
//! Shapes returned by the aggregator REST API. Most entities deserialize
//! straight into [`crate::models`]; accounts and investments differ enough
//! (currency field name, nullable numbers) to need a wire struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Account, AccountType, CreditCardBill, Investment, Transaction, TransactionPage, CONNECTOR_TYPES,
};

/// Paged listing envelope (`{ results, total, totalPages, page }`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl Paged<Transaction> {
    /// Convert to a page, deriving missing totals from `page_size`
    pub fn into_page(self, requested_page: u32, page_size: u32) -> TransactionPage {
        let total = self.total.unwrap_or(self.results.len() as u64);
        let total_pages = self
            .total_pages
            .unwrap_or_else(|| total_pages_for(total, page_size));
        TransactionPage {
            transactions: self.results,
            total,
            total_pages,
            page: self.page.unwrap_or(requested_page),
        }
    }
}

/// Number of pages needed for `total` rows
pub fn total_pages_for(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size)) as u32
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTokenRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTokenResponse {
    pub access_token: Option<String>,
}

/// Account as the aggregator reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAccount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub balance: f64,
    pub currency_code: Option<String>,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub number: Option<String>,
    pub subtype: Option<String>,
    pub item_id: Option<String>,
}

impl From<WireAccount> for Account {
    fn from(wire: WireAccount) -> Self {
        Account {
            id: wire.id,
            name: wire.name,
            balance: wire.balance,
            currency: wire.currency_code.unwrap_or_else(|| "BRL".to_string()),
            account_type: wire.account_type,
            number: wire.number,
            subtype: wire.subtype,
            item_id: wire.item_id,
        }
    }
}

/// Investment as the aggregator reports it (numbers may be null)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInvestment {
    pub id: String,
    pub name: String,
    pub number: Option<String>,
    pub balance: Option<f64>,
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub investment_type: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub value: Option<f64>,
    pub quantity: Option<f64>,
    pub item_id: String,
}

impl From<WireInvestment> for Investment {
    fn from(wire: WireInvestment) -> Self {
        Investment {
            id: wire.id,
            name: wire.name,
            number: wire.number,
            balance: wire.balance.unwrap_or(0.0),
            amount: Some(wire.amount.unwrap_or(0.0)),
            investment_type: wire.investment_type.unwrap_or_default(),
            date: wire.date,
            value: Some(wire.value.unwrap_or(0.0)),
            quantity: Some(wire.quantity.unwrap_or(0.0)),
            item_id: wire.item_id,
        }
    }
}

/// Credit card bill as the aggregator reports it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBill {
    pub id: String,
    pub account_id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub close_date: Option<String>,
    pub billing_date: Option<String>,
    #[serde(alias = "totalAmount")]
    pub amount: Option<f64>,
    #[serde(alias = "totalAmountCurrencyCode")]
    pub currency_code: Option<String>,
    pub period: Option<String>,
}

impl WireBill {
    /// Fill gaps; `account_id` is the account the bills were requested for
    pub fn into_bill(self, account_id: &str) -> CreditCardBill {
        CreditCardBill {
            id: self.id,
            account_id: self.account_id.unwrap_or_else(|| account_id.to_string()),
            name: self.name.unwrap_or_else(|| "Credit Card Bill".to_string()),
            status: self.status.unwrap_or_else(|| "PENDING".to_string()),
            due_date: self.due_date.unwrap_or_default(),
            close_date: self.close_date.or(self.billing_date).unwrap_or_default(),
            amount: self.amount.unwrap_or(0.0),
            currency_code: self.currency_code.unwrap_or_else(|| "USD".to_string()),
            period: self.period.unwrap_or_default(),
        }
    }
}

/// Connector listing filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorFilter {
    pub name: Option<String>,
    pub countries: Vec<String>,
    pub types: Vec<String>,
}

impl ConnectorFilter {
    /// Build from comma-separated query values; unknown connector types are dropped
    pub fn parse(name: Option<&str>, countries: Option<&str>, types: Option<&str>) -> Self {
        let split = |value: Option<&str>| -> Vec<String> {
            value
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            name: name.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
            countries: split(countries),
            types: split(types)
                .into_iter()
                .filter(|t| CONNECTOR_TYPES.contains(&t.as_str()))
                .collect(),
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref name) = self.name {
            pairs.push(("name", name.clone()));
        }
        if !self.countries.is_empty() {
            pairs.push(("countries", self.countries.join(",")));
        }
        if !self.types.is_empty() {
            pairs.push(("types", self.types.join(",")));
        }
        pairs
    }
}
