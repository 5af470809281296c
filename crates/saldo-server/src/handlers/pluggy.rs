//! Aggregator proxy handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{get_user_id, AppError, AppState, SuccessResponse};
use saldo_core::aggregator::{AggregatorBackend, ConnectorFilter};
use saldo_core::filters::DEFAULT_PAGE_SIZE;
use saldo_core::query::TransactionQuery;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsQuery {
    pub item_id: Option<String>,
}

/// GET /api/pluggy/accounts - Accounts of one item, or the caller's stored accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<AccountsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let accounts = match params.item_id.as_deref().filter(|id| !id.is_empty()) {
        Some(item_id) => state
            .aggregator()?
            .list_accounts(item_id)
            .await
            .map_err(|e| AppError::aggregator(e, "Failed to fetch accounts"))?,
        None => state
            .db
            .list_user_accounts(&get_user_id(&headers))?
            .into_iter()
            .map(|a| a.account)
            .collect(),
    };

    Ok(Json(serde_json::json!({ "accounts": accounts })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub account_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub category_id: Option<String>,
    pub search: Option<String>,
}

/// Largest page the proxy will request
const MAX_PAGE_SIZE: u32 = 500;

fn parse_page_size(size: Option<u32>) -> Result<u32, AppError> {
    match size {
        None => Ok(DEFAULT_PAGE_SIZE),
        Some(0) => Err(AppError::bad_request("Page size must be positive")),
        Some(size) if size > MAX_PAGE_SIZE => Err(AppError::bad_request(&format!(
            "Page size must be at most {}",
            MAX_PAGE_SIZE
        ))),
        Some(size) => Ok(size),
    }
}

fn parse_date(value: &str, field: &str) -> Result<chrono::NaiveDate, AppError> {
    chrono::NaiveDate::parse_from_str(value, saldo_core::query::QUERY_DATE_FORMAT)
        .map_err(|_| AppError::bad_request(&format!("Invalid {} date: {}", field, value)))
}

impl TransactionsQuery {
    fn into_query(self) -> Result<TransactionQuery, AppError> {
        let account_id = self
            .account_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::bad_request("Account ID is required"))?;

        let page_size = parse_page_size(self.page_size)?;
        let mut query = TransactionQuery::new(account_id, page_size).with_page(self.page.unwrap_or(1));

        if let Some(search) = self.search.filter(|s| !s.trim().is_empty()) {
            query = query.with_search(search);
        }
        if let Some(category_id) = self.category_id.filter(|c| !c.is_empty()) {
            query = query.with_category(category_id);
        }
        if let Some(kind) = self.transaction_type.filter(|t| !t.is_empty()) {
            let kind = kind.parse().map_err(|e: String| AppError::bad_request(&e))?;
            query = query.with_type(kind);
        }
        query.from = self.from.as_deref().map(|d| parse_date(d, "from")).transpose()?;
        query.to = self.to.as_deref().map(|d| parse_date(d, "to")).transpose()?;

        Ok(query)
    }
}

/// GET /api/pluggy/transactions - One filtered page of an account's transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionsQuery>,
) -> Result<Json<saldo_core::models::TransactionPage>, AppError> {
    let query = params.into_query()?;
    let page = state
        .aggregator()?
        .list_transactions(&query)
        .await
        .map_err(|e| AppError::aggregator(e, "Failed to fetch transactions"))?;

    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoriesQuery {
    pub parent_id: Option<String>,
}

/// GET /api/pluggy/categories - Category catalogue, optionally one parent's children
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoriesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut categories = state
        .aggregator()?
        .list_categories()
        .await
        .map_err(|e| AppError::aggregator(e, "Failed to fetch categories"))?;

    if let Some(parent_id) = params.parent_id.filter(|p| !p.is_empty()) {
        categories.retain(|c| c.parent_id.as_deref() == Some(parent_id.as_str()));
    }

    Ok(Json(serde_json::json!({ "categories": categories })))
}

#[derive(Debug, Deserialize)]
pub struct ConnectorsQuery {
    pub name: Option<String>,
    pub countries: Option<String>,
    pub types: Option<String>,
}

/// GET /api/pluggy/connectors - Institutions available for linking
pub async fn list_connectors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectorsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let filter = ConnectorFilter::parse(
        params.name.as_deref(),
        params.countries.as_deref(),
        params.types.as_deref(),
    );
    let connectors = state
        .aggregator()?
        .list_connectors(&filter)
        .await
        .map_err(|e| AppError::aggregator(e, "Failed to fetch connectors"))?;

    Ok(Json(serde_json::json!({ "connectors": connectors })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTokenQuery {
    pub item_id: Option<String>,
}

/// GET /api/pluggy/connect-token - Token for the connect widget
///
/// Passing an item id produces a token that updates that item instead of
/// creating a new one.
pub async fn create_connect_token(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectTokenQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let token = state
        .aggregator()?
        .create_connect_token(params.item_id.as_deref().filter(|id| !id.is_empty()))
        .await
        .map_err(|e| AppError::aggregator(e, "Failed to generate connect token"))?;

    Ok(Json(serde_json::json!({ "accessToken": token })))
}

/// GET /api/pluggy/items/:id - Item status from the aggregator
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let item = state
        .aggregator()?
        .get_item(&id)
        .await
        .map_err(|e| AppError::aggregator(e, "Item not found"))?;

    Ok(Json(serde_json::json!({ "item": item })))
}

/// DELETE /api/pluggy/items/:id - Unlink an item
///
/// The item must belong to the caller. Deletion at the aggregator is best
/// effort; the stored connection is removed either way.
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_id = get_user_id(request.headers());

    if state.db.item_owner(&id)?.as_deref() != Some(user_id.as_str()) {
        return Err(AppError::not_found(
            "Item not found or not authorized to delete",
        ));
    }

    if let Some(aggregator) = state.aggregator.as_ref() {
        if let Err(e) = aggregator.delete_item(&id).await {
            warn!(item_id = %id, error = %e, "Failed to delete item at aggregator, removing locally");
        }
    }

    state.db.delete_connection(&user_id, &id)?;
    info!(user = %user_id, item_id = %id, "Item deleted");

    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentsQuery {
    pub item_id: Option<String>,
    pub account_id: Option<String>,
}

/// GET /api/pluggy/investments - Investments of an item, or of an account's item
pub async fn list_investments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InvestmentsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let aggregator = state.aggregator()?;

    let item_id = match (
        params.item_id.filter(|id| !id.is_empty()),
        params.account_id.filter(|id| !id.is_empty()),
    ) {
        (Some(item_id), _) => item_id,
        (None, Some(account_id)) => {
            let account = aggregator
                .get_account(&account_id)
                .await
                .map_err(|e| AppError::aggregator(e, "Account not found"))?;
            account
                .item_id
                .ok_or_else(|| AppError::not_found("Account has no linked item"))?
        }
        (None, None) => {
            return Err(AppError::bad_request(
                "Either itemId or accountId is required",
            ))
        }
    };

    let investments = aggregator
        .list_investments(&item_id)
        .await
        .map_err(|e| AppError::aggregator(e, "Failed to fetch investments"))?;

    Ok(Json(serde_json::json!({ "investments": investments })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillsQuery {
    pub account_id: Option<String>,
}

/// GET /api/pluggy/credit-cards - Statements of a credit card account
pub async fn list_credit_card_bills(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BillsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let account_id = params
        .account_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Account ID is required"))?;

    let bills = state
        .aggregator()?
        .list_credit_card_bills(&account_id)
        .await
        .map_err(|e| AppError::aggregator(e, "Failed to fetch credit card bills"))?;

    Ok(Json(serde_json::json!({ "creditCardBills": bills })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityQuery {
    pub item_id: Option<String>,
}

/// GET /api/pluggy/identity - Account holder of an item
pub async fn get_identity(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdentityQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let item_id = params
        .item_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Item ID is required"))?;

    let identity = state
        .aggregator()?
        .get_identity(&item_id)
        .await
        .map_err(|e| AppError::aggregator(e, "Failed to fetch identity"))?;

    Ok(Json(serde_json::json!({ "identity": identity })))
}
