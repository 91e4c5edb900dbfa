// src/http/routes.rs
// Front door handlers: chat, health, tool catalog

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

use super::error::{ApiError, ApiResult};
use crate::llm::ChatMessage;
use crate::protocol::{Envelope, JSONRPC_VERSION};
use crate::proxy::ToolProxy;
use crate::router::{
    ConversationContext, DEFAULT_PERMISSION, DEFAULT_SESSION_ID, DEFAULT_USER_ID, RouteOutcome,
    RouteResult,
};

const X_USER_ID: &str = "x-user-id";
const X_SESSION_ID: &str = "x-session-id";
const X_PERMISSIONS: &str = "x-permissions";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    pub timestamp: String,
}

impl ChatReply {
    fn from_route(result: &RouteResult) -> Self {
        let action = match &result.routed.outcome {
            RouteOutcome::Structured { tool } => Some(action_for(tool, &result.routed.call)),
            RouteOutcome::Fallback { .. } => None,
        };

        match &result.reply.error {
            Some(error) => Self {
                success: false,
                ai_response: None,
                error: Some(error.clone()),
                action,
                timestamp: Utc::now().to_rfc3339(),
            },
            None => Self {
                success: true,
                ai_response: Some(render_reply(&result.reply)),
                error: None,
                action,
                timestamp: Utc::now().to_rfc3339(),
            },
        }
    }
}

/// POST /chat
pub async fn chat(
    State(proxy): State<Arc<ToolProxy>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatReply>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut ctx = context_from_headers(&headers);
    ctx.history = request.history;

    let result = proxy.handle_chat(&request.message, &ctx).await?;
    Ok(Json(ChatReply::from_route(&result)))
}

/// GET /health
pub async fn health(State(proxy): State<Arc<ToolProxy>>) -> impl IntoResponse {
    let executor = proxy.channel_state();
    Json(HealthResponse {
        status: if executor == crate::channel::ChannelState::Ready { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        executor: executor.as_str(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    executor: &'static str,
}

/// GET /tools
pub async fn tools(State(proxy): State<Arc<ToolProxy>>) -> impl IntoResponse {
    Json(proxy.catalog().clone())
}

/// Caller identity from request headers, with defaults
pub fn context_from_headers(headers: &HeaderMap) -> ConversationContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let permissions = match header(X_PERMISSIONS) {
        None => vec![DEFAULT_PERMISSION.to_string()],
        Some(raw) => serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|e| {
            warn!(value = %raw, error = %e, "Ignoring malformed x-permissions header");
            vec![DEFAULT_PERMISSION.to_string()]
        }),
    };

    ConversationContext {
        user_id: header(X_USER_ID).unwrap_or(DEFAULT_USER_ID).to_string(),
        session_id: header(X_SESSION_ID).unwrap_or(DEFAULT_SESSION_ID).to_string(),
        permissions,
        history: Vec::new(),
    }
}

/// Executor reply as shown to the caller.
///
/// Tool results wrap their payload as `result.content[0].text`; when that text
/// is JSON it replaces the result. Anything else passes through unchanged.
pub fn render_reply(reply: &Envelope) -> Value {
    let parsed = reply
        .result
        .as_ref()
        .and_then(|r| r.get("content"))
        .and_then(|c| c.get(0))
        .and_then(|first| first.get("text"))
        .and_then(Value::as_str)
        .and_then(|text| serde_json::from_str::<Value>(text).ok());

    match parsed {
        Some(result) => json!({
            "jsonrpc": JSONRPC_VERSION,
            "result": result,
            "id": reply.id,
        }),
        None => serde_json::to_value(reply).unwrap_or(Value::Null),
    }
}

/// `{type: <tool>, ...arguments}` for a structured call
fn action_for(tool: &str, call: &Envelope) -> Value {
    let mut action = Map::new();
    action.insert("type".into(), Value::String(tool.to_string()));
    if let Some(Value::Object(arguments)) = call.params.as_ref().and_then(|p| p.get("arguments")) {
        for (key, value) in arguments {
            if key != "type" {
                action.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(action)
}
