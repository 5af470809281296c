//! Stored connection handlers

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{get_user_id, AppError, AppState, SuccessResponse};
use saldo_core::aggregator::AggregatorBackend;

/// Request body for linking an item
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub item_id: Option<String>,
}

/// GET /api/items - Every connection of the caller, newest first
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = get_user_id(request.headers());
    let items = state.db.list_connections(&user_id)?;
    Ok(Json(serde_json::json!({ "items": items })))
}

/// POST /api/items - Store an item linked through the connect widget
///
/// Fetches the item and its accounts from the aggregator and upserts both.
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = get_user_id(request.headers());

    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: CreateItemRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;
    let item_id = req
        .item_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Item ID is required"))?;

    if let Some(owner) = state.db.item_owner(&item_id)? {
        if owner != user_id {
            return Err(AppError::not_found("Item not found"));
        }
    }

    let aggregator = state.aggregator()?;
    let item = aggregator
        .get_item(&item_id)
        .await
        .map_err(|e| AppError::aggregator(e, "Item not found at aggregator"))?;
    let accounts = aggregator
        .list_accounts(&item_id)
        .await
        .map_err(|e| AppError::aggregator(e, "Failed to fetch accounts"))?;

    let connection = state.db.save_connection(&user_id, &item, &accounts)?;
    info!(user = %user_id, item_id = %item_id, accounts = accounts.len(), "Item linked");

    Ok(Json(serde_json::json!({ "item": connection })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionQuery {
    pub item_id: Option<String>,
}

/// GET /api/user/connections - Active connections of the caller
pub async fn list_connections(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = get_user_id(request.headers());
    let connections = state.db.list_active_connections(&user_id)?;
    Ok(Json(serde_json::json!({ "connections": connections })))
}

/// DELETE /api/user/connections?itemId= - Forget a connection locally
pub async fn delete_connection(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectionQuery>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_id = get_user_id(request.headers());
    let item_id = params
        .item_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Item ID is required"))?;

    if !state.db.delete_connection(&user_id, &item_id)? {
        return Err(AppError::not_found("Connection not found"));
    }
    info!(user = %user_id, item_id = %item_id, "Connection removed");

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/user/accounts - Accounts under the caller's active connections
pub async fn list_user_accounts(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = get_user_id(request.headers());
    let accounts = state.db.list_user_accounts(&user_id)?;
    Ok(Json(serde_json::json!({ "accounts": accounts })))
}
