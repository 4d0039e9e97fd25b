use std::time::Instant;

use futures_util::StreamExt;
use parking_lot::Mutex;

use super::transport::{BodyError, ChatTransport};
use super::ChatRequest;
use crate::error::ClassifiedError;
use crate::observability::log_stream_complete;
use crate::stream::{ChunkOutcome, StreamPipeline, DEFAULT_MAX_BUFFERED_BYTES};
use crate::transcript::{Transcript, TranscriptObserver};

/// Lifecycle of one streaming attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed(ClassifiedError),
}

impl StreamState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Failed(_))
    }
}

/// Resource limits for a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLimits {
    pub max_buffered_bytes: usize,
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            max_buffered_bytes: DEFAULT_MAX_BUFFERED_BYTES,
        }
    }
}

/// Final report of a streaming attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    pub state: StreamState,
    pub tokens: usize,
    pub bytes: u64,
    pub saw_done: bool,
    /// The stream ended while a partial event was still buffered.
    pub truncated: bool,
}

impl StreamOutcome {
    #[must_use]
    pub fn error(&self) -> Option<ClassifiedError> {
        match self.state {
            StreamState::Failed(class) => Some(class),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == StreamState::Completed
    }
}

struct StreamRun {
    state: StreamState,
    tokens: usize,
    bytes: u64,
    saw_done: bool,
    truncated: bool,
    started: Instant,
}

impl StreamRun {
    fn new() -> Self {
        Self {
            state: StreamState::Idle,
            tokens: 0,
            bytes: 0,
            saw_done: false,
            truncated: false,
            started: Instant::now(),
        }
    }

    fn transition(&mut self, next: StreamState) {
        debug_assert!(!self.state.is_terminal(), "attempt already finished");
        tracing::debug!("chat stream {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn finish(mut self, next: StreamState, transcript: &Mutex<Transcript>) -> StreamOutcome {
        self.transition(next);
        transcript.lock().commit();
        let outcome = StreamOutcome {
            state: self.state,
            tokens: self.tokens,
            bytes: self.bytes,
            saw_done: self.saw_done,
            truncated: self.truncated,
        };
        log_stream_complete(&outcome, self.started.elapsed());
        outcome
    }
}

struct Reducer<'a, O: ?Sized> {
    transcript: &'a mut Transcript,
    observer: &'a mut O,
    applied: usize,
}

impl<O: TranscriptObserver + ?Sized> Reducer<'_, O> {
    fn apply(&mut self, token: &str) {
        self.transcript.apply_token(token);
        self.observer.publish(&*self.transcript);
        self.applied += 1;
    }
}

/// Send `request` and merge the streamed reply into `transcript`.
///
/// Every failure is classified here; nothing escapes unclassified. Tokens
/// merged before a failure stay in the transcript. Each chunk is processed
/// under the transcript lock, and the lock is never held across an await.
pub async fn run_stream<T, O>(
    transport: &T,
    request: &ChatRequest,
    transcript: &Mutex<Transcript>,
    observer: &mut O,
    limits: StreamLimits,
) -> StreamOutcome
where
    T: ChatTransport,
    O: TranscriptObserver + ?Sized,
{
    let mut run = StreamRun::new();
    run.transition(StreamState::Requesting);

    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!("chat request failed: {err}");
            return run.finish(
                StreamState::Failed(ClassifiedError::TransportFailure),
                transcript,
            );
        }
    };
    if let Some(class) = ClassifiedError::from_status(response.status) {
        tracing::warn!("chat endpoint returned status {}", response.status);
        return run.finish(StreamState::Failed(class), transcript);
    }
    let Some(mut body) = response.body else {
        tracing::warn!("chat endpoint returned no body");
        return run.finish(
            StreamState::Failed(ClassifiedError::TransportFailure),
            transcript,
        );
    };

    run.transition(StreamState::Streaming);
    let mut pipeline = StreamPipeline::new(limits.max_buffered_bytes);

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::warn!("chat stream interrupted: {err}");
                let class = match err {
                    BodyError::Disconnected(_) => ClassifiedError::TransportFailure,
                    BodyError::Other(_) => ClassifiedError::Unknown,
                };
                return run.finish(StreamState::Failed(class), transcript);
            }
        };
        run.bytes += chunk.len() as u64;

        let result = {
            let mut guard = transcript.lock();
            let mut reducer = Reducer {
                transcript: &mut *guard,
                observer: &mut *observer,
                applied: 0,
            };
            let result = pipeline.feed(&chunk, |token| reducer.apply(token));
            run.tokens += reducer.applied;
            result
        };

        match result {
            Ok(ChunkOutcome::Continue) => {}
            Ok(ChunkOutcome::Done) => {
                run.saw_done = true;
                break;
            }
            Err(fault) => {
                tracing::warn!("chat stream decode fault: {fault}");
                return run.finish(StreamState::Failed(ClassifiedError::Unknown), transcript);
            }
        }
    }

    if !run.saw_done {
        let finish = {
            let mut guard = transcript.lock();
            let mut reducer = Reducer {
                transcript: &mut *guard,
                observer: &mut *observer,
                applied: 0,
            };
            let finish = pipeline.finish(|token| reducer.apply(token));
            run.tokens += reducer.applied;
            finish
        };
        run.saw_done = finish.outcome == ChunkOutcome::Done;
        run.truncated = finish.truncated;
    }

    run.finish(StreamState::Completed, transcript)
}
