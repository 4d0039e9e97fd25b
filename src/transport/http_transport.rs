use std::time::Duration;

use bytes::Bytes;

use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::RelayError;

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
) -> Result<reqwest::Client, RelayError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .no_proxy()
        .build()
        .map_err(|err| RelayError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// HTTP client for the language-model provider behind the relay.
#[derive(Debug, Clone)]
pub struct UpstreamTransport {
    client: reqwest::Client,
    completions_url: String,
}

impl UpstreamTransport {
    /// Create a transport with connection pooling and timeouts from the server config.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] when the HTTP client cannot be built.
    pub fn new(server: &ServerConfig, upstream: &UpstreamConfig) -> Result<Self, RelayError> {
        let pool_idle_timeout = if server.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(server.http_pool_idle_timeout_secs))
        };
        let client = build_reqwest_client(
            server.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            Duration::from_secs(server.timeout),
        )?;
        Ok(Self {
            client,
            completions_url: completions_url(&upstream.base_url),
        })
    }

    #[must_use]
    pub fn completions_url(&self) -> &str {
        &self.completions_url
    }

    /// POST a streaming completion request. The caller reads the body as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] when the request cannot be sent or no
    /// response headers arrive.
    pub async fn send_stream(
        &self,
        api_key: &str,
        body: Bytes,
    ) -> Result<reqwest::Response, RelayError> {
        self.client
            .post(&self.completions_url)
            .bearer_auth(api_key)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::ACCEPT, "text/event-stream")
            .body(body)
            .send()
            .await
            .map_err(|err| RelayError::Transport(format!("Upstream request failed: {err}")))
    }
}

fn completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}
