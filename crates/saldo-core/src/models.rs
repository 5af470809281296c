//! Domain models for Saldo
//!
//! Field names serialize in camelCase, matching what the aggregator returns and
//! what the dashboard consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account display name used when a transaction's account cannot be resolved
pub const UNKNOWN_ACCOUNT: &str = "Unknown Account";

/// A bank, credit-card or investment account owned by the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub balance: f64,
    /// ISO currency code (e.g. "BRL")
    pub currency: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Masked account number
    pub number: Option<String>,
    pub subtype: Option<String>,
    /// The connection (item) this account belongs to
    pub item_id: Option<String>,
}

/// Account types as reported by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    Bank,
    Credit,
    Investment,
    Loan,
    #[serde(other)]
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "BANK",
            Self::Credit => "CREDIT",
            Self::Investment => "INVESTMENT",
            Self::Loan => "LOAN",
            Self::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BANK" => Ok(Self::Bank),
            "CREDIT" => Ok(Self::Credit),
            "INVESTMENT" => Ok(Self::Investment),
            "LOAN" => Ok(Self::Loan),
            "OTHER" => Ok(Self::Other),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
        }
    }

    /// Type selector options offered to the transactions table
    pub fn selector_options() -> &'static [&'static str] {
        &["all", "CREDIT", "DEBIT"]
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CREDIT" => Ok(Self::Credit),
            "DEBIT" => Ok(Self::Debit),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single transaction. Immutable once fetched; never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// Cleaned description
    pub description: String,
    /// Description exactly as the bank reported it
    pub description_raw: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Signed amount
    pub amount: f64,
    pub date: DateTime<Utc>,
    /// Category name
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub account_id: String,
    /// Owning account's display name, filled in by the coordinator
    pub account_name: Option<String>,
    pub currency_code: Option<String>,
    pub status: Option<String>,
    /// Account balance after this transaction
    pub balance: Option<f64>,
    pub operation_type: Option<String>,
    pub credit_card_metadata: Option<CreditCardMetadata>,
    pub payment_data: Option<PaymentData>,
    pub merchant: Option<Merchant>,
}

impl Transaction {
    pub fn is_credit(&self) -> bool {
        self.transaction_type == TransactionType::Credit
    }

    /// Category label for display
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or("Uncategorized")
    }
}

/// Installment data attached to card purchases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardMetadata {
    pub installment_number: Option<u32>,
    pub total_installments: Option<u32>,
    pub total_amount: Option<f64>,
    pub purchase_date: Option<String>,
    #[serde(rename = "payeeMCC")]
    pub payee_mcc: Option<u32>,
}

/// Transfer/payment details (PIX, TED, boleto...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    pub payment_method: Option<String>,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
    pub payer: Option<PaymentParty>,
    pub receiver: Option<PaymentParty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentParty {
    pub name: Option<String>,
    pub document_number: Option<DocumentNumber>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentNumber {
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Merchant {
    pub name: String,
    pub business_name: String,
    pub cnpj: String,
    pub category: Option<String>,
}

/// Transaction category from the aggregator's catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub description: String,
    pub description_translated: Option<String>,
    pub parent_id: Option<String>,
    pub parent_description: Option<String>,
}

impl Category {
    /// Translated description when present, otherwise the raw one
    pub fn display_name(&self) -> &str {
        self.description_translated
            .as_deref()
            .unwrap_or(&self.description)
    }
}

/// One page of transactions as reported by the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub total: u64,
    pub total_pages: u32,
    pub page: u32,
}

/// Institution connector (bank integration) offered by the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub id: i64,
    pub name: String,
    pub institution_url: Option<String>,
    pub image_url: Option<String>,
    pub primary_color: Option<String>,
    #[serde(rename = "type")]
    pub connector_type: Option<String>,
    pub country: Option<String>,
}

/// Connector types accepted by the connectors filter
pub const CONNECTOR_TYPES: &[&str] = &[
    "PERSONAL_BANK",
    "BUSINESS_BANK",
    "INVOICE",
    "INVESTMENT",
    "TELECOMMUNICATION",
    "DIGITAL_ECONOMY",
    "PAYMENT_ACCOUNT",
    "OTHER",
];

/// A linked bank credential/session at the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub connector: Connector,
    pub status: String,
    pub execution_status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Item status for a healthy connection
pub const ITEM_STATUS_ACTIVE: &str = "ACTIVE";

/// Statuses counted as active when listing a user's connections.
/// The aggregator reports a healthy, synced item as `UPDATED`/`UPDATING`.
pub const ACTIVE_ITEM_STATUSES: &[&str] = &[ITEM_STATUS_ACTIVE, "UPDATED", "UPDATING"];

pub fn is_active_status(status: &str) -> bool {
    ACTIVE_ITEM_STATUSES.contains(&status)
}

/// A stored connection with its mirrored accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub user_id: String,
    pub institution: String,
    pub status: String,
    pub image_url: Option<String>,
    pub primary_color: Option<String>,
    pub accounts: Vec<Account>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored account together with its institution name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(flatten)]
    pub account: Account,
    pub institution: String,
}

/// Investment position held under an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: String,
    pub name: String,
    pub number: Option<String>,
    pub balance: f64,
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub investment_type: String,
    pub date: Option<DateTime<Utc>>,
    pub value: Option<f64>,
    pub quantity: Option<f64>,
    pub item_id: String,
}

/// Credit card statement
///
/// Missing fields are filled in when converting from the wire shape, so
/// every field is always present here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardBill {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub status: String,
    pub due_date: String,
    pub close_date: String,
    pub amount: f64,
    pub currency_code: String,
    pub period: String,
}

/// Account holder details for an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub item_id: Option<String>,
    pub full_name: Option<String>,
    pub document: Option<String>,
    pub document_type: Option<String>,
    pub tax_number: Option<String>,
    pub birth_date: Option<String>,
    #[serde(default)]
    pub emails: Vec<IdentityContact>,
    #[serde(default)]
    pub phone_numbers: Vec<IdentityContact>,
    #[serde(default)]
    pub addresses: Vec<IdentityAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IdentityContact {
    pub value: String,
    #[serde(rename = "type")]
    pub contact_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAddress {
    pub full_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub address_type: Option<String>,
}
