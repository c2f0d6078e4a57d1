//! Pure, backend-agnostic parsing for the `t'<integer>'` placeholder
//! protocol. Kept separate from the gRPC client so the reassembly
//! invariant (lossless reconstruction) is testable without a server.

/// Accumulates placeholder token ids across chunks until a markerless
/// chunk triggers a detokenizer flush.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: Vec<i32>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_pending(&mut self) -> Vec<i32> {
        std::mem::take(&mut self.pending)
    }

    /// Parses one raw chunk: text preceding and between `t'N'` markers is
    /// returned immediately for emission, marker token ids are pushed
    /// into the pending buffer. Returns `(literal_text, saw_marker)`.
    pub fn parse_chunk(&mut self, raw: &str) -> (String, bool) {
        let mut saw_marker = false;
        let mut out = String::new();
        let mut rest = raw;

        while let Some(start) = rest.find("t'") {
            let Some(close_rel) = rest[start + 2..].find('\'') else {
                break;
            };
            let close = start + 2 + close_rel;
            let token_str = &rest[start + 2..close];

            out.push_str(&rest[..start]);
            match token_str.parse::<i32>() {
                Ok(token) => {
                    self.pending.push(token);
                    saw_marker = true;
                }
                Err(_) => out.push_str(&rest[start..=close]),
            }
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        (out, saw_marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_chunk_has_no_marker() {
        let mut r = Reassembler::new();
        let (text, saw_marker) = r.parse_chunk("hello world");
        assert_eq!(text, "hello world");
        assert!(!saw_marker);
        assert!(!r.has_pending());
    }

    #[test]
    fn marker_only_chunk_buffers_token_and_emits_nothing() {
        let mut r = Reassembler::new();
        let (text, saw_marker) = r.parse_chunk("t'128513'");
        assert_eq!(text, "");
        assert!(saw_marker);
        assert_eq!(r.take_pending(), vec![128513]);
    }

    #[test]
    fn prefix_before_marker_is_emitted_immediately() {
        let mut r = Reassembler::new();
        let (text, saw_marker) = r.parse_chunk("well t'128513'");
        assert_eq!(text, "well ");
        assert!(saw_marker);
        assert_eq!(r.take_pending(), vec![128513]);
    }

    #[test]
    fn multiple_markers_with_interstitial_text_all_captured() {
        let mut r = Reassembler::new();
        let (text, saw_marker) = r.parse_chunk("a t'1' b t'2' c");
        assert_eq!(text, "a  b  c");
        assert!(saw_marker);
        assert_eq!(r.take_pending(), vec![1, 2]);
    }

    #[test]
    fn non_numeric_quoted_content_is_treated_as_literal_text() {
        let mut r = Reassembler::new();
        let (text, saw_marker) = r.parse_chunk("it's t'abc' fine");
        assert_eq!(text, "it's t'abc' fine");
        assert!(!saw_marker);
    }

    #[test]
    fn pending_accumulates_across_successive_marker_chunks() {
        let mut r = Reassembler::new();
        r.parse_chunk("t'1'");
        r.parse_chunk("t'2'");
        assert_eq!(r.take_pending(), vec![1, 2]);
    }
}
