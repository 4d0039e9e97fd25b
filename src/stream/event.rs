/// Classification of event-stream lines.
pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// What a single logical line means to the delta pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent<'a> {
    Comment,
    Blank,
    /// Any field other than `data:`; ignored.
    Other,
    Done,
    Data(&'a str),
}

/// Classify one line. The payload of a data line has the `data:` prefix and
/// surrounding whitespace removed.
#[must_use]
pub fn classify_line(line: &str) -> LineEvent<'_> {
    if line.starts_with(':') {
        return LineEvent::Comment;
    }
    if line.trim().is_empty() {
        return LineEvent::Blank;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineEvent::Other;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        LineEvent::Done
    } else {
        LineEvent::Data(payload)
    }
}

/// How a line relates to a pending incomplete payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Continuation {
    /// Raw continuation text: join it to the remainder.
    Join,
    /// Separator, comment or unrelated field: keep waiting.
    Skip,
    /// A new data event: the remainder can never complete.
    Supersede,
}

pub(crate) fn continuation_of(line: &str) -> Continuation {
    match classify_line(line) {
        LineEvent::Comment | LineEvent::Blank => Continuation::Skip,
        LineEvent::Data(_) | LineEvent::Done => Continuation::Supersede,
        LineEvent::Other => {
            let is_field = ["event:", "id:", "retry:"]
                .iter()
                .any(|field| line.starts_with(field));
            if is_field {
                Continuation::Skip
            } else {
                Continuation::Join
            }
        }
    }
}
