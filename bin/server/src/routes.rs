//! HTTP routes for web chat, the SMS webhook, voice hand-off and health.

use crate::db::SESSIONS_TABLE;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_core::{AgentPersona, Channel};
use switchboard_router::{ReplyKind, RouteReply};

/// Builds the application routes.
pub fn app(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/api/chat", post(chat))
        .route("/api/sms", post(sms))
        .route("/api/voice/transcript", post(voice_transcript))
        .route("/health", get(health))
        .with_state(state)
}

/// JSON reply for chat and voice requests.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    pub persona: AgentPersona,
}

impl From<RouteReply> for ChatResponse {
    fn from(reply: RouteReply) -> Self {
        Self {
            message: reply.text,
            kind: reply.kind,
            persona: reply.persona,
        }
    }
}

/// Handles a web-chat message.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = body.map_err(json_rejection)?;
    let reply = state.router.handle(Channel::WebChat, &payload).await?;
    Ok(Json(reply.into()))
}

/// Handles a transcribed voice turn.
pub async fn voice_transcript(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = body.map_err(json_rejection)?;
    let reply = state.router.handle(Channel::Voice, &payload).await?;
    Ok(Json(reply.into()))
}

/// Handles the SMS provider's inbound-message webhook and answers in TwiML.
pub async fn sms(
    State(state): State<Arc<AppState>>,
    body: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(fields) = body.map_err(|e| ApiError::BadRequest {
        details: e.body_text(),
    })?;
    let payload = Value::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect::<Map<_, _>>(),
    );

    let reply = state.router.handle(Channel::Sms, &payload).await?;
    Ok(twiml(&reply.text))
}

/// Reports whether the sessions table exists.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.health.table_exists().await {
        Ok(true) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Ok(false) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unavailable",
                "error": format!("table {SESSIONS_TABLE} does not exist"),
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": e.to_string() })),
            )
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest {
        details: rejection.body_text(),
    }
}

/// Wraps `message` in a TwiML `<Message>` reply served as `text/xml`.
fn twiml(message: &str) -> Response {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>{}</Message></Response>"#,
        escape_xml(message)
    );
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// Escapes the five XML special characters so any agent text is safe as
/// element content.
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
