//! Test utilities for saldo-core
//!
//! Provides a mock Pluggy API server that can be used for development and
//! integration tests of the HTTP aggregator client.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

pub const TEST_CLIENT_ID: &str = "test-client";
pub const TEST_CLIENT_SECRET: &str = "test-secret";

#[derive(Default)]
struct ServerState {
    valid_key: Mutex<String>,
    keys_issued: AtomicUsize,
    auth_calls: AtomicUsize,
    deleted_items: Mutex<HashSet<String>>,
    transaction_queries: Mutex<Vec<HashMap<String, String>>>,
}

type Shared = Arc<ServerState>;

/// Mock Pluggy server for testing and development
pub struct MockPluggyServer {
    addr: SocketAddr,
    state: Shared,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockPluggyServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = Router::new()
            .route("/auth", post(handle_auth))
            .route("/accounts", get(handle_accounts))
            .route("/accounts/:id", get(handle_account))
            .route("/transactions", get(handle_transactions))
            .route("/categories", get(handle_categories))
            .route("/items/:id", get(handle_get_item).delete(handle_delete_item))
            .route("/connectors", get(handle_connectors))
            .route("/connect_token", post(handle_connect_token))
            .route("/investments", get(handle_investments))
            .route("/bills", get(handle_bills))
            .route("/identity", get(handle_identity))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of `/auth` calls received
    pub fn auth_calls(&self) -> usize {
        self.state.auth_calls.load(Ordering::SeqCst)
    }

    /// Invalidate the currently issued API key
    pub fn rotate_key(&self) {
        *self.state.valid_key.lock().unwrap() = "revoked".to_string();
    }

    /// Query parameters of the most recent `/transactions` call
    pub fn last_transaction_query(&self) -> Option<HashMap<String, String>> {
        self.state.transaction_queries.lock().unwrap().last().cloned()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockPluggyServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message, "code": status.as_u16() }))).into_response()
}

/// Reject requests without the currently valid API key
fn authorize(state: &ServerState, headers: &HeaderMap) -> Result<(), Response> {
    let sent = headers
        .get("X-API-KEY")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let valid = state.valid_key.lock().unwrap();
    if !valid.is_empty() && sent == valid.as_str() {
        Ok(())
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "Invalid API key"))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthBody {
    client_id: String,
    client_secret: String,
}

async fn handle_auth(State(state): State<Shared>, Json(body): Json<AuthBody>) -> Response {
    state.auth_calls.fetch_add(1, Ordering::SeqCst);
    if body.client_id != TEST_CLIENT_ID || body.client_secret != TEST_CLIENT_SECRET {
        return error(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    let n = state.keys_issued.fetch_add(1, Ordering::SeqCst) + 1;
    let key = format!("test-api-key-{}", n);
    *state.valid_key.lock().unwrap() = key.clone();
    Json(json!({ "apiKey": key })).into_response()
}

fn sample_accounts() -> Vec<Value> {
    vec![
        json!({
            "id": "acc-checking",
            "name": "Conta Corrente",
            "balance": 2450.75,
            "currencyCode": "BRL",
            "type": "BANK",
            "subtype": "CHECKING_ACCOUNT",
            "number": "0001/12345-0",
            "itemId": "item-1"
        }),
        json!({
            "id": "acc-card",
            "name": "Cartão Platinum",
            "balance": -830.10,
            "currencyCode": "BRL",
            "type": "CREDIT",
            "subtype": "CREDIT_CARD",
            "number": "4321",
            "itemId": "item-1"
        }),
    ]
}

fn sample_transactions(account_id: &str) -> Vec<Value> {
    match account_id {
        "acc-checking" => vec![
            json!({"id": "tx-1", "description": "Salary", "type": "CREDIT", "amount": 5000.0,
                   "date": "2024-03-05T12:00:00.000Z", "accountId": "acc-checking",
                   "category": "Income", "categoryId": "01000000", "currencyCode": "BRL"}),
            json!({"id": "tx-2", "description": "Supermarket", "type": "DEBIT", "amount": -312.4,
                   "date": "2024-03-04T18:30:00.000Z", "accountId": "acc-checking",
                   "category": "Groceries", "categoryId": "09000000", "currencyCode": "BRL"}),
            json!({"id": "tx-3", "description": "Rent", "type": "DEBIT", "amount": -1800.0,
                   "date": "2024-03-01T09:00:00.000Z", "accountId": "acc-checking",
                   "currencyCode": "BRL"}),
        ],
        "acc-card" => vec![
            json!({"id": "tx-4", "description": "Streaming", "type": "DEBIT", "amount": -39.9,
                   "date": "2024-03-03T00:00:00.000Z", "accountId": "acc-card",
                   "creditCardMetadata": {"installmentNumber": 1, "totalInstallments": 1}}),
            json!({"id": "tx-5", "description": "Card payment", "type": "CREDIT", "amount": 900.0,
                   "date": "2024-03-02T00:00:00.000Z", "accountId": "acc-card"}),
        ],
        _ => Vec::new(),
    }
}

async fn handle_accounts(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let item_id = params.get("itemId").cloned().unwrap_or_default();
    let results: Vec<Value> = sample_accounts()
        .into_iter()
        .filter(|a| a["itemId"] == item_id.as_str())
        .collect();
    let total = results.len();
    Json(json!({ "results": results, "total": total, "totalPages": 1, "page": 1 })).into_response()
}

async fn handle_account(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    match sample_accounts().into_iter().find(|a| a["id"] == id.as_str()) {
        Some(account) => Json(account).into_response(),
        None => error(StatusCode::NOT_FOUND, "Account not found"),
    }
}

async fn handle_transactions(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    state
        .transaction_queries
        .lock()
        .unwrap()
        .push(params.clone());

    let account_id = params.get("accountId").cloned().unwrap_or_default();
    match account_id.as_str() {
        "" => return error(StatusCode::BAD_REQUEST, "accountId is required"),
        "acc-broken" => return error(StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        "acc-garbled" => return (StatusCode::OK, "not json").into_response(),
        _ => {}
    }

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let page_size: usize = params
        .get("pageSize")
        .and_then(|p| p.parse().ok())
        .unwrap_or(20)
        .max(1);

    let all = sample_transactions(&account_id);
    let total = all.len();
    let total_pages = total.div_ceil(page_size);
    let results: Vec<Value> = all
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Json(json!({
        "results": results,
        "total": total,
        "totalPages": total_pages,
        "page": page
    }))
    .into_response()
}

async fn handle_categories(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    Json(json!({
        "results": [
            {"id": "01000000", "description": "Income", "descriptionTranslated": "Renda"},
            {"id": "09000000", "description": "Groceries", "descriptionTranslated": "Supermercado",
             "parentId": "08000000", "parentDescription": "Shopping"}
        ]
    }))
    .into_response()
}

fn sample_item(id: &str) -> Value {
    json!({
        "id": id,
        "status": "UPDATED",
        "executionStatus": "SUCCESS",
        "createdAt": "2024-01-10T10:00:00.000Z",
        "updatedAt": "2024-03-05T10:00:00.000Z",
        "connector": {
            "id": 201,
            "name": "Banco Exemplo",
            "institutionUrl": "https://exemplo.com.br",
            "imageUrl": "https://cdn.example.com/exemplo.png",
            "primaryColor": "8A05BE",
            "type": "PERSONAL_BANK",
            "country": "BR"
        }
    })
}

async fn handle_get_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if id != "item-1" || state.deleted_items.lock().unwrap().contains(&id) {
        return error(StatusCode::NOT_FOUND, "Item not found");
    }
    Json(sample_item(&id)).into_response()
}

async fn handle_delete_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    state.deleted_items.lock().unwrap().insert(id.clone());
    Json(json!({ "id": id })).into_response()
}

async fn handle_connectors(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let connector = sample_item("item-1")["connector"].clone();
    let matches = params
        .get("name")
        .map(|n| {
            connector["name"]
                .as_str()
                .unwrap_or_default()
                .to_lowercase()
                .contains(&n.to_lowercase())
        })
        .unwrap_or(true);
    let results: Vec<Value> = if matches { vec![connector] } else { Vec::new() };
    Json(json!({ "results": results })).into_response()
}

async fn handle_connect_token(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let n = state.keys_issued.load(Ordering::SeqCst);
    Json(json!({ "accessToken": format!("connect-{}", n) })).into_response()
}

async fn handle_investments(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let item_id = params.get("itemId").cloned().unwrap_or_default();
    Json(json!({
        "results": [{
            "id": "inv-1",
            "name": "CDB Banco Exemplo",
            "number": null,
            "balance": 10250.0,
            "amount": 10000.0,
            "type": "FIXED_INCOME",
            "date": "2024-03-01T00:00:00.000Z",
            "value": null,
            "quantity": null,
            "itemId": item_id
        }]
    }))
    .into_response()
}

async fn handle_bills(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let results = match params.get("accountId").map(String::as_str) {
        Some("acc-card") => vec![
            json!({"id": "bill-1", "accountId": "acc-card", "name": "Fatura Março",
                   "status": "CLOSED", "dueDate": "2024-03-15", "closeDate": "2024-03-05",
                   "totalAmount": 812.4, "totalAmountCurrencyCode": "BRL", "period": "2024-03"}),
            json!({"id": "bill-2", "billingDate": "2024-04-05", "totalAmount": null}),
        ],
        _ => Vec::new(),
    };
    let total = results.len();
    Json(json!({ "results": results, "total": total, "totalPages": 1, "page": 1 })).into_response()
}

async fn handle_identity(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if params.get("itemId").map(String::as_str) != Some("item-1") {
        return error(StatusCode::NOT_FOUND, "Identity not found");
    }
    Json(json!({
        "id": "identity-1",
        "itemId": "item-1",
        "fullName": "Maria Souza",
        "document": "123.456.789-00",
        "documentType": "CPF",
        "birthDate": "1990-05-20T00:00:00.000Z",
        "emails": [{"value": "maria@example.com", "type": "Personal"}],
        "phoneNumbers": [{"value": "+55 11 91234-5678", "type": "Personal"}],
        "addresses": [{"fullAddress": "Rua Exemplo 100, São Paulo", "city": "São Paulo",
                       "state": "SP", "postalCode": "01000-000", "country": "BR", "type": "Personal"}]
    }))
    .into_response()
}
