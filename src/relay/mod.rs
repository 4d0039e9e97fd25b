mod prompt;

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;

use crate::chat::ChatRequest;
use crate::error::RelayError;
use crate::state::AppState;
use crate::transcript::Turn;

pub use prompt::SYSTEM_PROMPT;

/// Path of the chat relay below the configured base path.
pub const CHAT_ROUTE: &str = "/medical-chat";

const ALLOW_ORIGIN: &str = "*";
const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const MAX_LOGGED_ERROR_CHARS: usize = 500;

/// Insert the cross-origin headers every relay response carries.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        http::header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

/// Answer a CORS preflight request.
#[must_use]
pub fn preflight() -> Response {
    let mut response = StatusCode::OK.into_response();
    apply_cors_headers(response.headers_mut());
    response
}

#[derive(Serialize)]
struct SystemMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(untagged)]
enum UpstreamMessage<'a> {
    System(SystemMessage<'a>),
    Turn(&'a Turn),
}

#[derive(Serialize)]
struct UpstreamRequest<'a> {
    model: &'a str,
    messages: Vec<UpstreamMessage<'a>>,
    stream: bool,
}

fn build_upstream_body(
    model: &str,
    system_prompt: &str,
    request: &ChatRequest,
) -> Result<Bytes, RelayError> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(UpstreamMessage::System(SystemMessage {
        role: "system",
        content: system_prompt,
    }));
    messages.extend(request.messages.iter().map(UpstreamMessage::Turn));
    let body = UpstreamRequest {
        model,
        messages,
        stream: true,
    };
    serde_json::to_vec(&body)
        .map(Bytes::from)
        .map_err(|err| RelayError::Internal(format!("Failed to encode upstream request: {err}")))
}

/// Relay one chat request to the provider and stream its reply back.
pub async fn handler(state: Arc<AppState>, body: Bytes) -> Response {
    let request_seq = state.next_request_seq();
    match relay(&state, &body, request_seq).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(request_seq, "medical chat error: {err}");
            err.into_response()
        }
    }
}

async fn relay(state: &AppState, body: &[u8], request_seq: u64) -> Result<Response, RelayError> {
    let request: ChatRequest = serde_json::from_slice(body)
        .map_err(|err| RelayError::InvalidRequest(err.to_string()))?;

    let Some(api_key) = state.config.upstream.resolve_api_key() else {
        tracing::error!(
            "upstream API key is not configured (set upstream.api_key or {})",
            state.config.upstream.api_key_env
        );
        return Err(RelayError::Config("AI service not configured".to_string()));
    };

    tracing::info!(
        request_seq,
        "Processing medical chat request with {} messages",
        request.messages.len()
    );

    let upstream_body =
        build_upstream_body(&state.config.upstream.model, &state.system_prompt, &request)?;
    let response = state.transport.send_stream(&api_key, upstream_body).await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let body = truncate_chars(&text, MAX_LOGGED_ERROR_CHARS);
        tracing::error!(request_seq, status = status.as_u16(), "AI gateway error: {body}");
        return Err(RelayError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    Ok(stream_response(response))
}

fn stream_response(response: reqwest::Response) -> Response {
    let body = axum::body::Body::from_stream(response.bytes_stream());
    let mut passthrough = Response::new(body);
    let headers = passthrough.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    apply_cors_headers(headers);
    passthrough
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
