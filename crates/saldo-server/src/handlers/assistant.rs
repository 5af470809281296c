//! Assistant and health handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use saldo_core::aggregator::AggregatorBackend;
use saldo_core::assistant::{ChatMessage, Sender};

/// GET /api/assistant/suggestions - Shortcut questions
pub async fn list_suggestions(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "suggestions": state.assistant.suggestions() }))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// POST /api/assistant/messages - Ask the assistant a question
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ChatMessage>, AppError> {
    let answer = state
        .assistant
        .reply(&req.content)
        .await
        .map_err(|e| AppError::bad_request(&e.to_string()))?;

    Ok(Json(ChatMessage {
        id: 0,
        content: answer.to_string(),
        sender: Sender::Assistant,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub aggregator: Option<String>,
    pub database: bool,
}

/// GET /api/health - Liveness plus collaborator status
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        aggregator: state.aggregator.as_ref().map(|a| a.name().to_string()),
        database: state.db.conn().is_ok(),
    })
}
