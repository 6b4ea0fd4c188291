use crate::{
    tokenizer::Vocabulary,
    tool_parser::{
        errors::ParserResult,
        parsers::helpers::{
            scaffolding_tail, strip_scaffolding, trim_scaffolding_end, trim_scaffolding_start,
            ScanEvent, ScanState,
        },
        traits::{CallFramer, CallSpan},
    },
};

/// Bare JSON objects anywhere in the text: `{"name": ..., "parameters": {...}}`.
///
/// A `{` starts a span only once the next non-whitespace character is a
/// quote, so a lone trailing `{` is not yet a call. The span runs to the
/// matching `}`, or to the end of the text while unbalanced. Spans are
/// tentative: prose may hold objects that are not calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceFramer;

impl BraceFramer {
    pub fn new() -> Self {
        Self
    }

    fn starts_object_with_key(text: &str, brace: usize) -> bool {
        text[brace + 1..]
            .trim_start_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r'))
            .starts_with('"')
    }
}

impl CallFramer for BraceFramer {
    fn bind(&mut self, _parser: &str, _vocab: &dyn Vocabulary) -> ParserResult<()> {
        Ok(())
    }

    fn has_markers(&self, text: &str) -> bool {
        !self.spans(text).is_empty()
    }

    fn spans<'a>(&self, text: &'a str) -> Vec<CallSpan<'a>> {
        let bytes = text.as_bytes();
        let mut spans = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'{' || !Self::starts_object_with_key(text, i) {
                i += 1;
                continue;
            }

            let mut scan = ScanState::default();
            let mut end = None;
            for (offset, &b) in bytes[i..].iter().enumerate() {
                if scan.process_byte(b, false) == ScanEvent::Close && scan.depth == 0 {
                    end = Some(i + offset + 1);
                    break;
                }
            }

            match end {
                Some(end) => {
                    spans.push(CallSpan {
                        body: &text[i..end],
                        start: i,
                        end,
                        closed: true,
                    });
                    i = end;
                }
                None => {
                    spans.push(CallSpan {
                        body: &text[i..],
                        start: i,
                        end: text.len(),
                        closed: false,
                    });
                    break;
                }
            }
        }

        spans
    }

    fn content(&self, text: &str, spans: &[CallSpan<'_>], accepted: &[bool]) -> Option<String> {
        let mut pieces = Vec::new();
        let mut cursor = 0;
        for (span, _) in spans
            .iter()
            .zip(accepted)
            .filter(|(_, accepted)| **accepted)
        {
            pieces.push(&text[cursor..span.start]);
            cursor = span.end;
        }
        pieces.push(&text[cursor..]);

        let content = pieces
            .into_iter()
            .map(strip_scaffolding)
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if content.is_empty() {
            None
        } else {
            Some(content)
        }
    }

    fn content_end(&self, text: &str, spans: &[CallSpan<'_>], finished: bool) -> usize {
        let from = match spans.last() {
            Some(span) if !span.closed => return text.len(),
            Some(span) => span.end,
            None => 0,
        };
        if finished {
            text.len()
        } else {
            from + scaffolding_tail(&text[from..])
        }
    }

    fn content_piece<'a>(&self, piece: &'a str, after_call: bool, before_call: bool) -> &'a str {
        let mut piece = piece;
        if before_call {
            piece = trim_scaffolding_end(piece);
        }
        if after_call {
            piece = trim_scaffolding_start(piece);
        }
        piece
    }

    fn is_tentative(&self) -> bool {
        true
    }
}
