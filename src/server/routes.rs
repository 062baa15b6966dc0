//! HTTP route handlers for the chat relay.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::conversation::resolve_conversation_id;
use crate::relay::ChatReply;

use super::error::ApiError;
use super::state::AppState;

/// Front-end page served at `/`.
pub const INDEX_FILE: &str = "index.html";

/// Assets servable by name; every other file name is a 404.
pub const STATIC_ASSETS: [&str; 2] = ["style.css", "script.js"];

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/reset", post(reset))
        .route("/{filename}", get(static_asset))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

/// Chat request body.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    /// The user's message; required and non-empty.
    pub message: Option<String>,
    /// Conversation to continue; defaults to the shared default key.
    pub conversation_id: Option<String>,
}

/// Handle a chat message: record it, forward the history, return the reply.
async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatReply>, ApiError> {
    let request: ChatRequest = parse_body(&headers, &body)?;
    let message = request
        .message
        .filter(|message| !message.is_empty())
        .ok_or(ApiError::MissingMessage)?;
    let conversation_id = resolve_conversation_id(request.conversation_id);

    let reply = state.relay.send(&conversation_id, &message).await?;
    Ok(Json(reply))
}

/// Reset request body.
#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    /// Conversation to forget; defaults to the shared default key.
    pub conversation_id: Option<String>,
}

/// Reset acknowledgement.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    /// Always `"reset"`.
    pub status: &'static str,
    /// Conversation that was reset.
    pub conversation_id: String,
}

/// Forget a conversation. An empty body resets the default key.
async fn reset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ResetResponse>, ApiError> {
    let request: ResetRequest = parse_body(&headers, &body)?;
    let conversation_id = resolve_conversation_id(request.conversation_id);

    state.relay.reset(&conversation_id).await;

    Ok(Json(ResetResponse {
        status: "reset",
        conversation_id,
    }))
}

/// Decode a JSON request body. An empty body reads as `{}`.
fn parse_body<T>(headers: &HeaderMap, body: &Bytes) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    if !has_json_content_type(headers) {
        return Err(ApiError::InvalidBody(
            "expected Content-Type: application/json".to_string(),
        ));
    }
    Json::<T>::from_bytes(body)
        .map(|Json(request)| request)
        .map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
}

/// Serve the front-end page.
async fn index(State(state): State<Arc<AppState>>, request: Request) -> Response {
    serve_file(state.static_dir.join(INDEX_FILE), request).await
}

/// Serve one of the allowlisted assets.
async fn static_asset(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    if !STATIC_ASSETS.contains(&filename.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    serve_file(state.static_dir.join(filename), request).await
}

async fn serve_file(path: PathBuf, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}
