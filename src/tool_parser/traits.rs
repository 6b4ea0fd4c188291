use async_trait::async_trait;

use crate::{
    tokenizer::Vocabulary,
    tool_parser::{
        errors::ParserResult,
        state::StreamState,
        types::{DeltaMessage, ExtractionResult, StreamChunk},
    },
};

/// Core trait for all tool parsers
///
/// Implementations hold no per-request state: everything a stream needs
/// between steps lives in the caller's `StreamState`.
#[async_trait]
pub trait ToolParser: Send + Sync {
    /// Registry name of this parser
    fn name(&self) -> &str;

    /// Extract every tool call from a complete generation
    async fn parse_complete(&self, output: &str) -> ParserResult<ExtractionResult>;

    /// Process one streaming step.
    ///
    /// Returns `None` when nothing should be emitted for this chunk. Failures
    /// are contained here: they are logged and leave `state` untouched.
    async fn parse_incremental(
        &self,
        state: &mut StreamState,
        chunk: &StreamChunk<'_>,
    ) -> Option<DeltaMessage>;

    /// Flush what the stream still holds once generation ended: content
    /// held back at the end of the text and calls left open.
    async fn finish_stream(
        &self,
        _state: &mut StreamState,
        _final_text: &str,
    ) -> Vec<DeltaMessage> {
        Vec::new()
    }

    /// Check if text contains tool calls in this parser's format
    fn has_tool_markers(&self, text: &str) -> bool;

    fn new_stream_state(&self) -> StreamState {
        StreamState::new()
    }
}

/// Number of calls begun and finished in a text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerCounts {
    pub opened: usize,
    pub closed: usize,
}

impl MarkerCounts {
    pub fn from_spans(spans: &[CallSpan<'_>]) -> Self {
        Self {
            opened: spans.len(),
            closed: spans.iter().filter(|span| span.closed).count(),
        }
    }
}

/// One call's material located in model output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSpan<'a> {
    /// Call text without framing markers
    pub body: &'a str,
    /// Byte offset where the framed region starts, markers included
    pub start: usize,
    /// Byte offset where the framed region ends, markers included
    pub end: usize,
    /// The framing says this call is finished
    pub closed: bool,
}

/// Locates tool call material in model output.
///
/// One implementation per framing behaviour; the marker strings are data.
pub trait CallFramer: Clone + Send + Sync + 'static {
    /// Resolve marker tokens against the vocabulary. Missing markers are a
    /// configuration error for `parser`.
    fn bind(&mut self, parser: &str, vocab: &dyn Vocabulary) -> ParserResult<()>;

    fn has_markers(&self, text: &str) -> bool;

    /// Call spans in document order. Spans of a prefix of `text` are never
    /// retracted as `text` grows.
    fn spans<'a>(&self, text: &'a str) -> Vec<CallSpan<'a>>;

    fn counts(&self, text: &str, _token_ids: &[u32]) -> MarkerCounts {
        MarkerCounts::from_spans(&self.spans(text))
    }

    /// Content of complete output once calls were extracted.
    /// `accepted[i]` tells whether `spans[i]` produced a call.
    fn content(&self, text: &str, spans: &[CallSpan<'_>], accepted: &[bool]) -> Option<String>;

    /// Offset where streamed content stops for now. Text past it is call
    /// material or may still turn into some; `finished` means no more text
    /// will arrive.
    fn content_end(&self, text: &str, _spans: &[CallSpan<'_>], _finished: bool) -> usize {
        text.len()
    }

    /// Streamed content for the text between calls. `after_call` and
    /// `before_call` tell which sides of the piece touch a call.
    fn content_piece<'a>(&self, piece: &'a str, _after_call: bool, _before_call: bool) -> &'a str {
        piece
    }

    /// Spans are only candidates until their first key names a call field
    fn is_tentative(&self) -> bool {
        false
    }
}
