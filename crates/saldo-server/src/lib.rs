//! Saldo Web Server
//!
//! Axum-based REST API for the Saldo personal finance dashboard. Proxies the
//! open-banking aggregator, persists linked connections and serves the
//! scripted assistant.
//!
//! Security features:
//! - API key / Cloudflare Access authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use saldo_core::aggregator::{AggregatorBackend, AggregatorClient};
use saldo_core::assistant::ScriptedAssistant;
use saldo_core::config::AggregatorConfig;
use saldo_core::db::Database;

mod handlers;

/// Cloudflare Access header for authenticated user email
const CF_ACCESS_USER_HEADER: &str = "cf-access-authenticated-user-email";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Environment variable holding comma-separated API keys
pub const API_KEYS_ENV: &str = "SALDO_API_KEYS";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// API keys accepted as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<String>,
    /// Aggregator connection settings
    pub aggregator: AggregatorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
            aggregator: AggregatorConfig::default(),
        }
    }
}

/// Parse a comma-separated list of API keys, ignoring blanks
pub fn parse_api_keys(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// None when the aggregator credentials are not configured
    pub aggregator: Option<AggregatorClient>,
    pub assistant: ScriptedAssistant,
}

impl AppState {
    /// The aggregator client, or 503 when it isn't configured
    pub fn aggregator(&self) -> Result<&AggregatorClient, AppError> {
        self.aggregator
            .as_ref()
            .ok_or_else(|| AppError::unavailable("Aggregator API credentials not configured"))
    }
}

/// Authentication middleware - accepts Cloudflare Access headers or API keys
///
/// # Security Notes
///
/// **Cloudflare Access headers**: The `CF-Access-Authenticated-User-Email` header is
/// safe behind Cloudflare Tunnel (which strips/rewrites CF headers), but can be
/// spoofed if the server is exposed directly to the internet.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let cf_user = request
        .headers()
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    if let Some(email) = cf_user {
        info!(user = %email, path = %request.uri().path(), "Authenticated via Cloudflare Access header");
        return next.run(request).await;
    }

    // Uses constant-time comparison to prevent timing attacks
    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        info!(user = "api-key", path = %request.uri().path(), "Authenticated via API key");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time comparison
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Identify the user owning the request's connections
///
/// Returns the CF Access email, "api-key" for API key auth, or "local-dev" for
/// unauthenticated requests.
pub fn get_user_id(headers: &axum::http::HeaderMap) -> String {
    if let Some(email) = headers
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return email.to_string();
    }

    if headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .is_some()
    {
        return "api-key".to_string();
    }

    "local-dev".to_string()
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router, configuring the aggregator from the environment
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let aggregator = match AggregatorClient::from_env(&config.aggregator) {
        Ok(Some(client)) => {
            info!("Aggregator backend configured: {}", client.name());
            Some(client)
        }
        Ok(None) => {
            info!("ℹ️  Aggregator not configured (set PLUGGY_CLIENT_ID and PLUGGY_CLIENT_SECRET)");
            None
        }
        Err(e) => {
            warn!(error = %e, "Failed to create aggregator client");
            None
        }
    };

    create_router_with_options(db, static_dir, config, aggregator, ScriptedAssistant::default())
}

/// Create the application router with explicit collaborators (for testing)
pub fn create_router_with_options(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    aggregator: Option<AggregatorClient>,
    assistant: ScriptedAssistant,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        aggregator,
        assistant,
    });

    let api_routes = Router::new()
        // Aggregator proxy
        .route("/pluggy/accounts", get(handlers::list_accounts))
        .route("/pluggy/transactions", get(handlers::list_transactions))
        .route("/pluggy/categories", get(handlers::list_categories))
        .route("/pluggy/connectors", get(handlers::list_connectors))
        .route("/pluggy/connect-token", get(handlers::create_connect_token))
        .route(
            "/pluggy/items/:id",
            get(handlers::get_item).delete(handlers::delete_item),
        )
        .route("/pluggy/investments", get(handlers::list_investments))
        .route("/pluggy/credit-cards", get(handlers::list_credit_card_bills))
        .route("/pluggy/identity", get(handlers::get_identity))
        // Stored connections
        .route(
            "/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route(
            "/user/connections",
            get(handlers::list_connections).delete(handlers::delete_connection),
        )
        .route("/user/accounts", get(handlers::list_user_accounts))
        // Assistant
        .route("/assistant/suggestions", get(handlers::list_suggestions))
        .route("/assistant/messages", post(handlers::send_message))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Reachable without credentials
    let public_routes = Router::new().route("/health", get(handlers::health));

    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // CSP: same-origin only, inline styles allowed
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' https: data:; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes.merge(public_routes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        warn!("No API keys configured; only Cloudflare Access requests will be accepted");
    }

    check_aggregator_connection(&config.aggregator).await;

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log aggregator connection status
async fn check_aggregator_connection(config: &AggregatorConfig) {
    match AggregatorClient::from_env(config) {
        Ok(Some(client)) => {
            if client.health_check().await {
                info!("✅ Aggregator connected: {}", client.name());
            } else {
                warn!("⚠️  Aggregator configured but not responding: {}", client.name());
            }
        }
        Ok(None) => {
            info!("ℹ️  Aggregator not configured (set PLUGGY_CLIENT_ID and PLUGGY_CLIENT_SECRET)");
        }
        Err(e) => warn!(error = %e, "Aggregator client could not be created"),
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map an aggregator failure, keeping its 404 and hiding everything else
    pub fn aggregator(err: saldo_core::Error, msg: &str) -> Self {
        let status = match &err {
            saldo_core::Error::Aggregator { status: 404, .. } | saldo_core::Error::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            saldo_core::Error::InvalidData(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: msg.to_string(),
            internal: Some(err.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, status = %self.status, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
