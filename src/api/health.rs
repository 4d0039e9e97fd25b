use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "mediassist relay is running",
        "config": {
            "model": config.upstream.model,
            "base_path": config.server.base_path,
            "api_key_configured": config.upstream.resolve_api_key().is_some(),
            "features": {
                "system_prompt_override": config.features.system_prompt.is_some(),
                "log_level": config.features.log_level,
            }
        }
    }))
}
