use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use super::ChatRequest;
use crate::config::ClientConfig;

/// Response body as a stream of raw chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BodyError>> + Send>>;

/// Failure while reading a response body.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("connection lost while streaming: {0}")]
    Disconnected(String),
    #[error("failed to read response body: {0}")]
    Other(String),
}

/// The request could not be sent or no response headers arrived.
#[derive(Debug, thiserror::Error)]
#[error("failed to send chat request: {0}")]
pub struct TransportError(pub String);

/// Status and (optional) body of a chat response.
pub struct ChatResponse {
    pub status: u16,
    pub body: Option<BodyStream>,
}

impl ChatResponse {
    #[must_use]
    pub fn new(status: u16, body: BodyStream) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    #[must_use]
    pub fn without_body(status: u16) -> Self {
        Self { status, body: None }
    }
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatResponse")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Originates chat requests. Implementations own headers and authorization.
pub trait ChatTransport {
    fn send(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, TransportError>> + Send;
}

/// Reqwest-backed transport posting to the relay endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    client: reqwest::Client,
    chat_url: String,
    publishable_key: String,
}

impl HttpChatTransport {
    /// Build a transport for the configured chat endpoint.
    ///
    /// No read timeout is set: a response may stream for as long as the
    /// upstream keeps the connection open.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(5))
            .no_proxy()
            .build()
            .map_err(|err| TransportError(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            chat_url: config.chat_url.clone(),
            publishable_key: config.publishable_key.clone(),
        })
    }

    #[must_use]
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

impl ChatTransport for HttpChatTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let body = serde_json::to_vec(request)
            .map_err(|err| TransportError(format!("Failed to encode request: {err}")))?;
        let mut builder = self
            .client
            .post(&self.chat_url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(body);
        if !self.publishable_key.is_empty() {
            builder = builder.bearer_auth(&self.publishable_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError(err.to_string()))?;
        let status = response.status().as_u16();
        if response.content_length() == Some(0) {
            return Ok(ChatResponse::without_body(status));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(classify_body_error));
        Ok(ChatResponse::new(status, Box::pin(body)))
    }
}

fn classify_body_error(err: reqwest::Error) -> BodyError {
    if err.is_body() || err.is_timeout() || err.is_connect() || err.is_request() {
        BodyError::Disconnected(err.to_string())
    } else {
        BodyError::Other(err.to_string())
    }
}
