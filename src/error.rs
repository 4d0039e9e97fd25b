use axum::http::StatusCode;

use crate::relay::apply_cors_headers;

/// Terminal classification of a failed chat attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClassifiedError {
    #[error("rate limited by the assistant service")]
    RateLimited,
    #[error("assistant service credits exhausted")]
    CreditsExhausted,
    #[error("transport failure")]
    TransportFailure,
    #[error("unknown streaming failure")]
    Unknown,
}

/// User-facing notification for a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub description: &'static str,
}

impl ClassifiedError {
    /// Classify a response status. Success statuses yield `None`.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            402 => Some(Self::CreditsExhausted),
            429 => Some(Self::RateLimited),
            _ => Some(Self::TransportFailure),
        }
    }

    #[must_use]
    pub fn notice(self) -> Notice {
        match self {
            Self::RateLimited => Notice {
                title: "Rate Limit Exceeded",
                description: "Too many requests. Please wait a moment and try again.",
            },
            Self::CreditsExhausted => Notice {
                title: "Service Unavailable",
                description: "AI credits exhausted. Please contact support.",
            },
            Self::TransportFailure => Notice {
                title: "Connection Problem",
                description: "Could not reach the assistant. Please try again.",
            },
            Self::Unknown => Notice {
                title: "Error",
                description: "Failed to get response. Please try again.",
            },
        }
    }
}

/// Errors raised by the upstream relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Config(String),
    #[error("AI gateway error: {status}")]
    Upstream { status: u16, body: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream { status: 429, .. } => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Upstream { status: 402, .. } => StatusCode::PAYMENT_REQUIRED,
            RelayError::Config(_)
            | RelayError::Upstream { .. }
            | RelayError::Transport(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `{"error": ...}` body sent to the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RelayError::Upstream { status: 429, .. } => {
                "Rate limit exceeded. Please try again in a moment.".to_string()
            }
            RelayError::Upstream { status: 402, .. } => {
                "AI service credits exhausted. Please contact support.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl axum::response::IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.client_message() });
        let mut response = (self.status(), axum::Json(body)).into_response();
        apply_cors_headers(response.headers_mut());
        response
    }
}
