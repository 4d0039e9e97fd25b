use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// How a token was merged into the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Created { index: usize },
    Appended { index: usize },
}

/// Append-only conversation transcript.
///
/// At most one assistant turn is in progress, and it is always the last
/// turn. Committed turns are never modified, removed or reordered.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    in_progress: bool,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The assistant turn currently receiving tokens, if any.
    #[must_use]
    pub fn in_progress_turn(&self) -> Option<&Turn> {
        if self.in_progress {
            self.turns.last()
        } else {
            None
        }
    }

    /// Commit any in-progress turn and append a user turn. Returns its index.
    pub fn push_user(&mut self, content: impl Into<String>) -> usize {
        self.commit();
        self.turns.push(Turn::user(content));
        self.turns.len() - 1
    }

    /// Merge one incremental token.
    pub fn apply_token(&mut self, token: &str) -> Reduction {
        if self.in_progress {
            if let Some(turn) = self.turns.last_mut() {
                turn.content.push_str(token);
                return Reduction::Appended {
                    index: self.turns.len() - 1,
                };
            }
        }
        self.turns.push(Turn::assistant(token));
        self.in_progress = true;
        Reduction::Created {
            index: self.turns.len() - 1,
        }
    }

    /// End the in-progress assistant turn. Returns whether one was open.
    pub fn commit(&mut self) -> bool {
        std::mem::replace(&mut self.in_progress, false)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }
}

/// Receives the transcript after every change.
///
/// `publish` runs while the owner holds the transcript lock. Implementations
/// must not re-enter the session that drives them; copy what they need from
/// the borrowed transcript instead.
pub trait TranscriptObserver {
    fn publish(&mut self, transcript: &Transcript);
}

impl<F> TranscriptObserver for F
where
    F: FnMut(&Transcript),
{
    fn publish(&mut self, transcript: &Transcript) {
        self(transcript);
    }
}

/// Observer that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TranscriptObserver for NoopObserver {
    fn publish(&mut self, _transcript: &Transcript) {}
}

/// Publishes transcript snapshots on a `watch` channel.
#[derive(Debug)]
pub struct WatchPublisher {
    tx: watch::Sender<Arc<[Turn]>>,
}

impl WatchPublisher {
    #[must_use]
    pub fn channel() -> (Self, watch::Receiver<Arc<[Turn]>>) {
        let (tx, rx) = watch::channel(Arc::<[Turn]>::from(Vec::new()));
        (Self { tx }, rx)
    }
}

impl TranscriptObserver for WatchPublisher {
    fn publish(&mut self, transcript: &Transcript) {
        self.tx.send_replace(Arc::from(transcript.turns()));
    }
}
