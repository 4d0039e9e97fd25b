use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::chat::StreamOutcome;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (TRACE, DEBUG, INFO, ERROR)
pub fn init_tracing(log_level: &str) {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return;
    }

    let filter =
        EnvFilter::try_new(tracing_directive(&level)).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn tracing_directive(level: &str) -> &str {
    match level {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    }
}

/// Log the summary of a finished chat stream.
pub fn log_stream_complete(outcome: &StreamOutcome, elapsed: Duration) {
    tracing::info!(
        state = ?outcome.state,
        tokens = outcome.tokens,
        bytes = outcome.bytes,
        saw_done = outcome.saw_done,
        truncated = outcome.truncated,
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "chat stream finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_aliases() {
        assert_eq!(tracing_directive("WARNING"), "WARN");
        assert_eq!(tracing_directive("CRITICAL"), "ERROR");
        assert_eq!(tracing_directive("DEBUG"), "DEBUG");
    }
}
