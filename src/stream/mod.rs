pub mod decoder;
pub mod delta;
pub mod event;
pub mod lines;

pub use decoder::Utf8FrameDecoder;
pub use delta::{parse_delta, DeltaOutcome};
pub use event::{classify_line, LineEvent, DATA_PREFIX, DONE_SENTINEL};
pub use lines::LineBuffer;

use event::{continuation_of, Continuation};

/// Default ceiling for text held without yielding a complete event.
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 1024 * 1024;

/// Whether the stream may continue after a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Continue,
    /// The terminator sentinel was seen; stop reading.
    Done,
}

/// Summary of the end-of-stream flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishOutcome {
    pub outcome: ChunkOutcome,
    /// An incomplete payload or an unterminated line was left over.
    pub truncated: bool,
}

/// Faults raised while turning body chunks into tokens.
#[derive(Debug, thiserror::Error)]
pub enum StreamFault {
    #[error("buffered {buffered} bytes without a complete event (limit {limit})")]
    BufferOverflow { buffered: usize, limit: usize },
}

/// Decode, split, filter and parse one response body.
///
/// Each call to [`StreamPipeline::feed`] processes a chunk to completion and
/// hands every extracted token to the caller, in stream order.
#[derive(Debug)]
pub struct StreamPipeline {
    decoder: Utf8FrameDecoder,
    lines: LineBuffer,
    max_buffered_bytes: usize,
}

impl StreamPipeline {
    #[must_use]
    pub fn new(max_buffered_bytes: usize) -> Self {
        Self {
            decoder: Utf8FrameDecoder::new(),
            lines: LineBuffer::new(),
            max_buffered_bytes,
        }
    }

    /// Process one raw body chunk.
    ///
    /// # Errors
    ///
    /// Returns [`StreamFault::BufferOverflow`] when more than the configured
    /// number of bytes is held without forming a complete event.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_token: F) -> Result<ChunkOutcome, StreamFault>
    where
        F: FnMut(&str),
    {
        let text = self.decoder.decode(chunk);
        self.lines.push(&text);
        if self.drain(&mut on_token) == ChunkOutcome::Done {
            return Ok(ChunkOutcome::Done);
        }

        let buffered = self.lines.buffered_len() + self.decoder.pending_len();
        if buffered > self.max_buffered_bytes {
            return Err(StreamFault::BufferOverflow {
                buffered,
                limit: self.max_buffered_bytes,
            });
        }
        Ok(ChunkOutcome::Continue)
    }

    /// Flush the decoder and make a last pass over complete lines once the
    /// transport reports end of input.
    pub fn finish<F>(&mut self, mut on_token: F) -> FinishOutcome
    where
        F: FnMut(&str),
    {
        if let Some(text) = self.decoder.finish() {
            self.lines.push(&text);
        }
        let outcome = self.drain(&mut on_token);
        let truncated = outcome == ChunkOutcome::Continue
            && (self.lines.has_remainder() || !self.lines.tail().trim().is_empty());
        if truncated {
            tracing::warn!(
                "event stream ended with {} unconsumed bytes",
                self.lines.buffered_len()
            );
        }
        self.lines.clear();
        FinishOutcome { outcome, truncated }
    }

    /// Text still held by the line buffer, pending remainder first.
    #[must_use]
    pub fn buffered(&self) -> String {
        self.lines.contents()
    }

    /// Consume every complete line. An incomplete payload is put back in front
    /// of the buffer, and each following line is then joined to it, skipped
    /// or allowed to supersede it, so the result never depends on how the
    /// body was chunked.
    fn drain<F>(&mut self, on_token: &mut F) -> ChunkOutcome
    where
        F: FnMut(&str),
    {
        while let Some(line) = self.lines.next_line() {
            let line = match self.lines.take_remainder() {
                None => line,
                Some(mut pending) => match continuation_of(&line) {
                    Continuation::Join => {
                        pending.push('\n');
                        pending.push_str(&line);
                        pending
                    }
                    Continuation::Skip => {
                        self.lines.requeue(pending);
                        continue;
                    }
                    Continuation::Supersede => {
                        tracing::warn!(
                            "abandoning incomplete delta payload ({} bytes) superseded by a new event",
                            pending.len()
                        );
                        line
                    }
                },
            };

            let delta = match classify_line(&line) {
                LineEvent::Comment | LineEvent::Blank | LineEvent::Other => continue,
                LineEvent::Done => return ChunkOutcome::Done,
                LineEvent::Data(payload) => parse_delta(payload),
            };

            match delta {
                DeltaOutcome::Token(token) => on_token(&token),
                DeltaOutcome::Empty | DeltaOutcome::Malformed => {}
                DeltaOutcome::Incomplete => {
                    tracing::trace!("deferring incomplete delta payload for reassembly");
                    self.lines.requeue(line);
                }
            }
        }
        ChunkOutcome::Continue
    }
}

impl Default for StreamPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFERED_BYTES)
    }
}
