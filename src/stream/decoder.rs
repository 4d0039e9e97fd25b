/// Stateful UTF-8 decoding of response body chunks.
///
/// HTTP bodies arrive in arbitrary byte slices, so a multi-byte character can
/// straddle two chunks. The decoder keeps the incomplete trailing bytes of one
/// chunk and completes them with the head of the next.
use smallvec::SmallVec;

const REPLACEMENT: char = char::REPLACEMENT_CHARACTER;

/// Incremental UTF-8 decoder with explicit carry-over state.
///
/// Invalid sequences decode to U+FFFD and decoding continues; there is no
/// error path other than end of stream.
#[derive(Debug, Default)]
pub struct Utf8FrameDecoder {
    pending: SmallVec<[u8; 4]>,
}

impl Utf8FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut out = String::with_capacity(chunk.len() + self.pending.len());
        if self.pending.is_empty() {
            self.decode_into(chunk, &mut out);
        } else {
            let mut joined = std::mem::take(&mut self.pending).into_vec();
            joined.extend_from_slice(chunk);
            self.decode_into(&joined, &mut out);
        }
        out
    }

    /// Flush at end of stream. A truncated trailing sequence becomes a single
    /// replacement character.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        Some(REPLACEMENT.to_string())
    }

    /// Number of undecoded bytes carried into the next chunk.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn decode_into(&mut self, mut bytes: &[u8], out: &mut String) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    // Safety: valid_up_to is guaranteed to be a valid UTF-8 boundary.
                    let text = unsafe { std::str::from_utf8_unchecked(&bytes[..valid_up_to]) };
                    out.push_str(text);
                    match e.error_len() {
                        Some(invalid_len) => {
                            out.push(REPLACEMENT);
                            bytes = &bytes[valid_up_to + invalid_len..];
                        }
                        None => {
                            // Valid prefix of a multi-byte character; wait for the rest.
                            self.pending.extend_from_slice(&bytes[valid_up_to..]);
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii_passthrough() {
        let mut decoder = Utf8FrameDecoder::new();
        assert_eq!(decoder.decode(b"data: hi\n"), "data: hi\n");
        assert_eq!(decoder.pending_len(), 0);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_decode_multibyte_split_at_every_offset() {
        let text = "fièvre 头痛 🤒";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8FrameDecoder::new();
            let mut out = decoder.decode(&bytes[..split]);
            out.push_str(&decoder.decode(&bytes[split..]));
            assert_eq!(out, text, "split at {split}");
            assert!(decoder.finish().is_none());
        }
    }

    #[test]
    fn test_decode_four_byte_char_one_byte_at_a_time() {
        let bytes = "🤒".as_bytes();
        let mut decoder = Utf8FrameDecoder::new();
        for byte in &bytes[..3] {
            assert_eq!(decoder.decode(std::slice::from_ref(byte)), "");
        }
        assert_eq!(decoder.pending_len(), 3);
        assert_eq!(decoder.decode(&bytes[3..]), "🤒");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_decode_invalid_bytes_become_replacement() {
        let mut decoder = Utf8FrameDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_decode_broken_sequence_followed_by_ascii() {
        let mut decoder = Utf8FrameDecoder::new();
        assert_eq!(decoder.decode(b"x\xe5"), "x");
        assert_eq!(decoder.decode(b"y"), "\u{FFFD}y");
    }

    #[test]
    fn test_finish_flushes_truncated_sequence() {
        let mut decoder = Utf8FrameDecoder::new();
        assert_eq!(decoder.decode(b"ok\xf0\x9f"), "ok");
        assert_eq!(decoder.finish().as_deref(), Some("\u{FFFD}"));
        assert_eq!(decoder.pending_len(), 0);
    }
}
