use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::orchestrator::{run_stream, StreamLimits, StreamOutcome};
use super::transport::ChatTransport;
use super::ChatRequest;
use crate::transcript::{Transcript, TranscriptObserver, Turn};

/// Reasons a send action is refused before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("a reply is still streaming")]
    Busy,
    #[error("message is empty")]
    EmptyMessage,
}

/// A single conversation bound to one transport.
///
/// Only one reply streams at a time; the busy flag gates [`ChatSession::send`].
pub struct ChatSession<T> {
    transport: T,
    transcript: Mutex<Transcript>,
    busy: AtomicBool,
    limits: StreamLimits,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: ChatTransport> ChatSession<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_limits(transport, StreamLimits::default())
    }

    #[must_use]
    pub fn with_limits(transport: T, limits: StreamLimits) -> Self {
        Self {
            transport,
            transcript: Mutex::new(Transcript::new()),
            busy: AtomicBool::new(false),
            limits,
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn transcript(&self) -> Vec<Turn> {
        self.transcript.lock().snapshot()
    }

    /// Append the trimmed user message and stream the assistant reply.
    ///
    /// Whatever the outcome, the transcript keeps everything merged so far.
    /// Dropping the returned future stops reading and releases the busy flag.
    ///
    /// `observer` is called while the transcript lock is held, so it must not
    /// call back into this session (for example [`ChatSession::transcript`]).
    ///
    /// # Errors
    ///
    /// Returns [`SendError::EmptyMessage`] for blank input and
    /// [`SendError::Busy`] while another reply is streaming.
    pub async fn send<O>(&self, input: &str, observer: &mut O) -> Result<StreamOutcome, SendError>
    where
        O: TranscriptObserver + ?Sized,
    {
        let message = input.trim();
        if message.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        let _busy = BusyGuard::acquire(&self.busy).ok_or(SendError::Busy)?;

        let request = {
            let mut transcript = self.transcript.lock();
            transcript.push_user(message);
            observer.publish(&transcript);
            ChatRequest::from_transcript(&transcript)
        };
        tracing::debug!("sending chat request with {} messages", request.messages.len());

        Ok(run_stream(
            &self.transport,
            &request,
            &self.transcript,
            observer,
            self.limits,
        )
        .await)
    }
}
