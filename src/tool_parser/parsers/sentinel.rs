use crate::{
    tokenizer::Vocabulary,
    tool_parser::{
        errors::{ParserError, ParserResult},
        parsers::helpers::ScanState,
        traits::{CallFramer, CallSpan},
    },
};

/// Calls following a leading sentinel token, e.g. `[TOOL_CALLS] [{...}, {...}]`
/// or `<|python_tag|>{...}; {...}`.
///
/// Output must open with the sentinel (leading whitespace aside). The rest is
/// split into calls at top-level separators; when bracketed, a top-level `]`
/// ends the call material.
#[derive(Debug, Clone)]
pub struct SentinelFramer {
    sentinel: String,
    separator: String,
    bracketed: bool,
    sentinel_id: Option<u32>,
}

impl SentinelFramer {
    pub fn new(sentinel: impl Into<String>, separator: &str, bracketed: bool) -> Self {
        Self {
            sentinel: sentinel.into(),
            separator: separator.trim().to_string(),
            bracketed,
            sentinel_id: None,
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    pub fn sentinel_id(&self) -> Option<u32> {
        self.sentinel_id
    }

    /// Byte offset where call material starts, if the text opens with the sentinel
    fn material_start(&self, text: &str) -> Option<usize> {
        let lead = text.len() - text.trim_start().len();
        text[lead..]
            .starts_with(&self.sentinel)
            .then_some(lead + self.sentinel.len())
    }
}

fn push_segment<'a>(
    spans: &mut Vec<CallSpan<'a>>,
    text: &'a str,
    start: usize,
    end: usize,
    closed: bool,
) {
    let raw = &text[start..end];
    let body = raw.trim();
    if body.is_empty() {
        return;
    }
    let lead = raw.len() - raw.trim_start().len();
    spans.push(CallSpan {
        body,
        start: start + lead,
        end: start + lead + body.len(),
        closed,
    });
}

impl CallFramer for SentinelFramer {
    fn bind(&mut self, parser: &str, vocab: &dyn Vocabulary) -> ParserResult<()> {
        let id = vocab
            .token_to_id(&self.sentinel)
            .ok_or_else(|| ParserError::MissingMarkerToken {
                parser: parser.to_string(),
                token: self.sentinel.clone(),
            })?;
        self.sentinel_id = Some(id);
        Ok(())
    }

    fn has_markers(&self, text: &str) -> bool {
        text.contains(&self.sentinel)
    }

    fn spans<'a>(&self, text: &'a str) -> Vec<CallSpan<'a>> {
        let spans = Vec::new();
        let Some(mut pos) = self.material_start(text) else {
            return spans;
        };
        let bytes = text.as_bytes();

        if self.bracketed {
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos == bytes.len() {
                return spans;
            }
            if bytes[pos] == b'[' {
                pos += 1;
            } else {
                // Tolerate a bare object list after the sentinel
                return self.split_segments(text, pos, false);
            }
            return self.split_segments(text, pos, true);
        }

        self.split_segments(text, pos, false)
    }

    fn content(&self, _text: &str, _spans: &[CallSpan<'_>], _accepted: &[bool]) -> Option<String> {
        None
    }

    fn content_end(&self, text: &str, _spans: &[CallSpan<'_>], finished: bool) -> usize {
        if self.material_start(text).is_some() {
            return 0;
        }
        // Leading whitespace or a sentinel still arriving
        if !finished && self.sentinel.starts_with(text.trim_start()) {
            return 0;
        }
        text.len()
    }
}

impl SentinelFramer {
    fn split_segments<'a>(&self, text: &'a str, from: usize, in_array: bool) -> Vec<CallSpan<'a>> {
        let bytes = text.as_bytes();
        let separator = self.separator.as_bytes();
        let mut spans = Vec::new();
        let mut scan = ScanState::default();
        let mut segment_start = from;
        let mut i = from;

        while i < bytes.len() {
            let b = bytes[i];
            if !scan.in_string && scan.depth == 0 {
                if in_array && b == b']' {
                    push_segment(&mut spans, text, segment_start, i, true);
                    return spans;
                }
                if !separator.is_empty() && bytes[i..].starts_with(separator) {
                    push_segment(&mut spans, text, segment_start, i, true);
                    i += separator.len();
                    segment_start = i;
                    scan = ScanState::default();
                    continue;
                }
            }
            scan.process_byte(b, true);
            i += 1;
        }

        push_segment(&mut spans, text, segment_start, bytes.len(), scan.is_balanced());
        spans
    }
}
