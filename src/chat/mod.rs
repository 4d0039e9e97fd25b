pub mod orchestrator;
pub mod session;
pub mod transport;

pub use orchestrator::{run_stream, StreamLimits, StreamOutcome, StreamState};
pub use session::{ChatSession, SendError};
pub use transport::{
    BodyError, BodyStream, ChatResponse, ChatTransport, HttpChatTransport, TransportError,
};

use serde::{Deserialize, Serialize};

use crate::transcript::{Transcript, Turn};

/// Body sent to the chat endpoint: the full conversation so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Turn>,
}

impl ChatRequest {
    #[must_use]
    pub fn from_transcript(transcript: &Transcript) -> Self {
        Self {
            messages: transcript.snapshot(),
        }
    }
}
