/// Extraction of incremental text from chat-completion chunk payloads.
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DeltaChunk {
    #[serde(default)]
    choices: Option<Vec<DeltaChoice>>,
}

#[derive(Debug, Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: Option<DeltaContent>,
}

#[derive(Debug, Deserialize)]
struct DeltaContent {
    #[serde(default)]
    content: Option<String>,
}

/// Result of parsing one data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Non-empty `choices[0].delta.content`.
    Token(String),
    /// Well-formed chunk without text (role preamble, finish chunk, usage).
    Empty,
    /// JSON ended before the value was complete; retry with more input.
    Incomplete,
    /// Absent or unparseable payload; dropped.
    Malformed,
}

/// Parse a data payload and extract the first choice's content delta.
#[must_use]
pub fn parse_delta(payload: &str) -> DeltaOutcome {
    if payload.is_empty() {
        return DeltaOutcome::Malformed;
    }
    match serde_json::from_str::<DeltaChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map_or(DeltaOutcome::Empty, DeltaOutcome::Token),
        Err(err) if err.is_eof() => DeltaOutcome::Incomplete,
        Err(err) => {
            tracing::debug!("dropping malformed delta payload: {err}");
            DeltaOutcome::Malformed
        }
    }
}
