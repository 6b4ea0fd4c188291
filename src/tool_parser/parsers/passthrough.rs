//! Passthrough parser that returns text unchanged
//!
//! Used as the fallback for models without a tool call convention. It never
//! detects calls: one-shot output is all content and every streamed chunk is
//! forwarded as-is.

use async_trait::async_trait;

use crate::tool_parser::{
    errors::ParserResult,
    state::StreamState,
    traits::ToolParser,
    types::{DeltaMessage, ExtractionResult, StreamChunk},
};

/// Passthrough parser that returns text unchanged with no tool calls
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughParser;

impl PassthroughParser {
    pub const NAME: &'static str = "passthrough";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolParser for PassthroughParser {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn parse_complete(&self, output: &str) -> ParserResult<ExtractionResult> {
        Ok(ExtractionResult::no_tools(output))
    }

    async fn parse_incremental(
        &self,
        _state: &mut StreamState,
        chunk: &StreamChunk<'_>,
    ) -> Option<DeltaMessage> {
        if chunk.delta_text.is_empty() {
            return None;
        }
        Some(DeltaMessage::Content {
            content: chunk.delta_text.to_string(),
        })
    }

    fn has_tool_markers(&self, _text: &str) -> bool {
        false
    }
}
