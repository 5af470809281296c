//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use saldo_core::aggregator::{MockBackend, PluggyBackend};
use saldo_core::db::Database;
use saldo_core::test_utils::{MockPluggyServer, TEST_CLIENT_ID, TEST_CLIENT_SECRET};
use std::time::Duration;
use tower::ServiceExt;

fn test_config() -> ServerConfig {
    ServerConfig {
        require_auth: false,
        ..Default::default()
    }
}

fn setup_test_app() -> (Router, Database, MockBackend) {
    let db = Database::in_memory().unwrap();
    let mock = MockBackend::with_sample_data();
    let app = create_router_with_options(
        db.clone(),
        None,
        test_config(),
        Some(AggregatorClient::mock(mock.clone())),
        ScriptedAssistant::new(Duration::ZERO),
    );
    (app, db, mock)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn link_demo_item(app: &Router, user: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/items")
                .header("content-type", "application/json")
                .header(CF_ACCESS_USER_HEADER, user)
                .body(Body::from(r#"{"itemId":"item-demo"}"#))
                .unwrap(),
        )
        .await
        .unwrap()
}

// ========== Auth Tests ==========

#[tokio::test]
async fn test_auth_required_by_default() {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        api_keys: vec!["secret-key".into()],
        ..Default::default()
    };
    let app = create_router_with_options(db, None, config, None, ScriptedAssistant::default());

    let response = app
        .clone()
        .oneshot(get("/api/user/accounts"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/user/accounts")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/user/accounts")
                .header("authorization", "Bearer secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/user/accounts")
                .header(CF_ACCESS_USER_HEADER, "alice@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_public() {
    let db = Database::in_memory().unwrap();
    let app = create_router_with_options(
        db,
        None,
        ServerConfig::default(),
        None,
        ScriptedAssistant::default(),
    );

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["aggregator"].is_null());
    assert_eq!(json["database"], true);
}

#[test]
fn test_get_user_id() {
    let mut headers = axum::http::HeaderMap::new();
    assert_eq!(get_user_id(&headers), "local-dev");

    headers.insert("authorization", "Bearer abc".parse().unwrap());
    assert_eq!(get_user_id(&headers), "api-key");

    headers.insert(CF_ACCESS_USER_HEADER, "bob@example.com".parse().unwrap());
    assert_eq!(get_user_id(&headers), "bob@example.com");
}

#[test]
fn test_parse_api_keys() {
    assert_eq!(parse_api_keys("a, b,,c "), vec!["a", "b", "c"]);
    assert!(parse_api_keys("  ").is_empty());
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["alpha".to_string(), "beta-key".to_string()];
    assert!(validate_api_key("alpha", &keys));
    assert!(validate_api_key("beta-key", &keys));
    assert!(!validate_api_key("alph", &keys));
    assert!(!validate_api_key("alpha", &[]));
}

// ========== Aggregator Proxy Tests ==========

#[tokio::test]
async fn test_transactions_require_account_id() {
    let (app, _, _) = setup_test_app();

    let response = app.oneshot(get("/api/pluggy/transactions")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Account ID is required");
}

#[tokio::test]
async fn test_transactions_forward_filters() {
    let (app, _, mock) = setup_test_app();

    let response = app
        .oneshot(get(
            "/api/pluggy/transactions?accountId=acc-card&type=DEBIT&search=netflix&page=1&pageSize=50",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let transactions = json["transactions"].as_array().unwrap();
    assert!(!transactions.is_empty());
    assert!(transactions
        .iter()
        .all(|t| t["description"] == "Netflix.com"));
    assert_eq!(json["page"], 1);
    assert_eq!(json["totalPages"], 1);

    let queries = mock.transaction_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].page_size, 50);
    assert_eq!(queries[0].search.as_deref(), Some("netflix"));
}

#[tokio::test]
async fn test_transactions_reject_bad_parameters() {
    let (app, _, _) = setup_test_app();

    for uri in [
        "/api/pluggy/transactions?accountId=acc-card&pageSize=0",
        "/api/pluggy/transactions?accountId=acc-card&pageSize=501",
        "/api/pluggy/transactions?accountId=acc-card&type=REFUND",
        "/api/pluggy/transactions?accountId=acc-card&from=yesterday",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn test_transactions_accept_any_page_size_up_to_bound() {
    let (app, _, mock) = setup_test_app();

    for size in [20, 75, 500] {
        let response = app
            .clone()
            .oneshot(get(&format!(
                "/api/pluggy/transactions?accountId=acc-checking&pageSize={}",
                size
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "pageSize={}", size);
    }

    let response = app
        .oneshot(get("/api/pluggy/transactions?accountId=acc-checking&pageSize=20"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["transactions"].as_array().unwrap().len(), 20);
    assert_eq!(json["totalPages"], 2);

    let sizes: Vec<u32> = mock
        .transaction_queries()
        .iter()
        .map(|q| q.page_size)
        .collect();
    assert_eq!(sizes, vec![20, 75, 500, 20]);
}

#[tokio::test]
async fn test_transactions_failure_is_sanitized() {
    let (app, _, mock) = setup_test_app();
    mock.fail_account("acc-card");

    let response = app
        .oneshot(get("/api/pluggy/transactions?accountId=acc-card"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Failed to fetch transactions");
}

#[tokio::test]
async fn test_categories_filtered_by_parent() {
    let (app, _, _) = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/categories"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["categories"].as_array().unwrap().len(), 7);

    let response = app
        .oneshot(get("/api/pluggy/categories?parentId=08000000"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let children = json["categories"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| c["parentId"] == "08000000"));
}

fn get_as(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(CF_ACCESS_USER_HEADER, user)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_accounts_by_item_or_stored() {
    let (app, db, _) = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/accounts?itemId=item-demo"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["accounts"].as_array().unwrap().len(), 2);

    // Nothing stored yet
    let response = app
        .clone()
        .oneshot(get("/api/pluggy/accounts"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json["accounts"].as_array().unwrap().is_empty());

    link_demo_item(&app, "alice@example.com").await;
    assert_eq!(db.list_all_accounts().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get_as("/api/pluggy/accounts", "alice@example.com"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let accounts = json["accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 2);
    assert!(accounts.iter().all(|a| a["itemId"] == "item-demo"));

    // Stored accounts are scoped to the caller
    let response = app
        .clone()
        .oneshot(get_as("/api/pluggy/accounts", "bob@example.com"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json["accounts"].as_array().unwrap().is_empty());

    let response = app.oneshot(get("/api/pluggy/accounts")).await.unwrap();
    let json = get_body_json(response).await;
    assert!(json["accounts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_credit_card_bills() {
    let (app, _, _) = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/credit-cards?accountId=acc-card"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let bills = json["creditCardBills"].as_array().unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0]["accountId"], "acc-card");
    assert_eq!(bills[0]["currencyCode"], "BRL");

    let response = app
        .oneshot(get("/api/pluggy/credit-cards"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Account ID is required");
}

#[tokio::test]
async fn test_identity_by_item() {
    let (app, _, _) = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/identity?itemId=item-demo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["identity"]["fullName"], "Maria Souza");
    assert_eq!(json["identity"]["emails"][0]["value"], "maria@example.com");

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/identity"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get("/api/pluggy/identity?itemId=item-unknown"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Failed to fetch identity");
}

#[tokio::test]
async fn test_connectors_and_connect_token() {
    let (app, _, _) = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/connectors?name=exemplo&types=PERSONAL_BANK,BOGUS"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let connectors = json["connectors"].as_array().unwrap();
    assert_eq!(connectors.len(), 1);
    assert_eq!(connectors[0]["name"], "Banco Exemplo");

    let response = app
        .oneshot(get("/api/pluggy/connect-token"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["accessToken"], "mock-connect-token");
}

#[tokio::test]
async fn test_aggregator_not_configured() {
    let db = Database::in_memory().unwrap();
    let app =
        create_router_with_options(db, None, test_config(), None, ScriptedAssistant::default());

    let response = app
        .oneshot(get("/api/pluggy/transactions?accountId=acc-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_investments_by_item_or_account() {
    let (app, _, _) = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/investments"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/investments?itemId=item-demo"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["investments"][0]["id"], "inv-cdb");

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/investments?accountId=acc-checking"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["investments"].as_array().unwrap().len(), 1);

    let response = app
        .oneshot(get("/api/pluggy/investments?accountId=acc-missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_item_not_found() {
    let (app, _, _) = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/items/item-demo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["item"]["status"], "UPDATED");

    let response = app
        .oneshot(get("/api/pluggy/items/item-nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Connection Tests ==========

#[tokio::test]
async fn test_link_item_and_list_for_user() {
    let (app, _, _) = setup_test_app();

    let response = link_demo_item(&app, "alice@example.com").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["item"]["institution"], "Banco Exemplo");
    assert_eq!(json["item"]["accounts"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/user/accounts")
                .header(CF_ACCESS_USER_HEADER, "alice@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let accounts = json["accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 2);
    assert!(accounts.iter().all(|a| a["institution"] == "Banco Exemplo"));

    // Other users see nothing
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/user/connections")
                .header(CF_ACCESS_USER_HEADER, "bob@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json["connections"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_link_item_requires_id() {
    let (app, _, _) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/items")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_link_item_owned_by_someone_else() {
    let (app, _, _) = setup_test_app();

    link_demo_item(&app, "alice@example.com").await;
    let response = link_demo_item(&app, "mallory@example.com").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_item_checks_owner() {
    let (app, db, mock) = setup_test_app();
    link_demo_item(&app, "alice@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/pluggy/items/item-demo")
                .header(CF_ACCESS_USER_HEADER, "mallory@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(db.list_all_accounts().unwrap().len(), 2);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/pluggy/items/item-demo")
                .header(CF_ACCESS_USER_HEADER, "alice@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(db.list_all_accounts().unwrap().is_empty());
    assert!(mock
        .calls()
        .contains(&saldo_core::aggregator::MockCall::DeleteItem("item-demo".into())));
}

#[tokio::test]
async fn test_delete_connection() {
    let (app, db, _) = setup_test_app();
    link_demo_item(&app, "local-dev").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/user/connections")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/user/connections?itemId=item-demo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(db.list_connections("local-dev").unwrap().is_empty());

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/user/connections?itemId=item-demo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Assistant Tests ==========

#[tokio::test]
async fn test_assistant_suggestions() {
    let (app, _, _) = setup_test_app();

    let response = app
        .oneshot(get("/api/assistant/suggestions"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let suggestions = json["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 8);
    assert_eq!(suggestions[0], "How can I save more money this month?");
}

#[tokio::test]
async fn test_assistant_message() {
    let (app, _, _) = setup_test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/assistant/messages")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"content":"How to reduce my credit card debt?"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["sender"], "assistant");
    assert!(json["content"].as_str().unwrap().contains("$4,850"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/assistant/messages")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"content":"  "}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Pluggy backend through the API ==========

#[tokio::test]
async fn test_transactions_through_pluggy_backend() {
    let server = MockPluggyServer::start().await;
    let backend = PluggyBackend::new(
        &server.url(),
        TEST_CLIENT_ID,
        TEST_CLIENT_SECRET,
        Duration::from_secs(5),
    )
    .unwrap();
    let app = create_router_with_options(
        Database::in_memory().unwrap(),
        None,
        test_config(),
        Some(AggregatorClient::Pluggy(backend)),
        ScriptedAssistant::default(),
    );

    let response = app
        .clone()
        .oneshot(get("/api/pluggy/transactions?accountId=acc-checking&search=cafe"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let query = server.last_transaction_query().unwrap();
    assert_eq!(query.get("accountId").map(String::as_str), Some("acc-checking"));
    assert_eq!(query.get("search").map(String::as_str), Some("cafe"));

    let response = app
        .oneshot(get("/api/pluggy/transactions?accountId=acc-broken"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
