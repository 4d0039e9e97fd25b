use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::RelayError;
use crate::relay::SYSTEM_PROMPT;
use crate::transport::UpstreamTransport;

/// Shared application state accessible to all relay handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: UpstreamTransport,
    pub system_prompt: Arc<str>,
    request_seq: AtomicU64,
}

impl AppState {
    /// Build relay state from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] when the upstream HTTP client cannot be built.
    pub fn new(config: AppConfig) -> Result<Self, RelayError> {
        let transport = UpstreamTransport::new(&config.server, &config.upstream)?;
        let system_prompt: Arc<str> = config
            .features
            .system_prompt
            .as_deref()
            .unwrap_or(SYSTEM_PROMPT)
            .into();
        Ok(Self {
            config,
            transport,
            system_prompt,
            request_seq: AtomicU64::new(1),
        })
    }

    pub(crate) fn next_request_seq(&self) -> u64 {
        self.request_seq.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const MINIMAL: &str = "upstream:\n  base_url: https://gateway.example/v1\nclient:\n  chat_url: http://127.0.0.1:8000/functions/v1/medical-chat\n";

    #[test]
    fn test_builtin_prompt_used_without_override() {
        let state = AppState::new(parse_config(MINIMAL).unwrap()).unwrap();
        assert_eq!(&*state.system_prompt, SYSTEM_PROMPT);
        assert_eq!(
            state.transport.completions_url(),
            "https://gateway.example/v1/chat/completions"
        );
    }

    #[test]
    fn test_prompt_override_and_request_sequence() {
        let mut config = parse_config(MINIMAL).unwrap();
        config.features.system_prompt = Some("Answer briefly.".to_string());
        let state = AppState::new(config).unwrap();
        assert_eq!(&*state.system_prompt, "Answer briefly.");
        assert_eq!(state.next_request_seq(), 1);
        assert_eq!(state.next_request_seq(), 2);
    }
}
