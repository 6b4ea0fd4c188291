// These helpers are shared by several test binaries
#![allow(dead_code)]

pub mod streaming_helpers;

use std::collections::BTreeMap;

use serde_json::Value;
use sgl_tool_parser::{
    tokenizer::MockTokenizer,
    tool_parser::{DeltaMessage, ParserRegistry, StreamChunk, StreamState, ToolParser},
};

/// Parser from the built-in registry, bound to the mock vocabulary
pub fn create_parser(name: &str) -> Box<dyn ToolParser> {
    ParserRegistry::with_builtins()
        .create_parser(name, &MockTokenizer::new())
        .unwrap_or_else(|e| panic!("failed to create parser {}: {}", name, e))
}

/// One call as reassembled from its deltas
#[derive(Debug, Default, Clone)]
pub struct StreamedCall {
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: String,
    pub initial_count: usize,
    pub name_count: usize,
    /// Deltas that arrived before the ones they depend on
    pub order_violations: Vec<String>,
}

impl StreamedCall {
    pub fn arguments_json(&self) -> Value {
        serde_json::from_str(&self.arguments)
            .unwrap_or_else(|e| panic!("streamed arguments {:?} are not JSON: {}", self.arguments, e))
    }
}

/// Everything a stream emitted, reassembled
#[derive(Debug, Default)]
pub struct StreamOutcome {
    pub content: String,
    pub calls: BTreeMap<usize, StreamedCall>,
    pub messages: Vec<DeltaMessage>,
    pub state: StreamState,
}

impl StreamOutcome {
    pub fn call(&self, index: usize) -> &StreamedCall {
        self.calls
            .get(&index)
            .unwrap_or_else(|| panic!("no call streamed at index {}", index))
    }

    pub fn names(&self) -> Vec<&str> {
        self.calls
            .values()
            .filter_map(|call| call.name.as_deref())
            .collect()
    }

    /// Each call got exactly one initial and one name delta, in order, and
    /// call indices run from zero without gaps
    pub fn assert_well_formed(&self) {
        let indices: Vec<usize> = self.calls.keys().copied().collect();
        let expected: Vec<usize> = (0..self.calls.len()).collect();
        assert_eq!(indices, expected, "call indices");

        for (index, call) in &self.calls {
            assert_eq!(call.initial_count, 1, "call {} initial deltas", index);
            assert_eq!(call.name_count, 1, "call {} name deltas", index);
            assert!(
                call.order_violations.is_empty(),
                "call {} out of order: {:?}",
                index,
                call.order_violations
            );
            let id = call.id.as_deref().unwrap_or_default();
            assert!(id.starts_with("chatcmpl-tool-"), "call {} id {:?}", index, id);
        }
    }

    fn record(&mut self, message: DeltaMessage) {
        match &message {
            DeltaMessage::Content { content } => self.content.push_str(content),
            DeltaMessage::ToolCalls { tool_calls } => {
                for delta in tool_calls {
                    let call = self.calls.entry(delta.index).or_default();
                    if delta.is_initial() {
                        call.initial_count += 1;
                        call.id = delta.id.clone();
                    }
                    if let Some(name) = &delta.function_delta.name {
                        if call.initial_count == 0 {
                            call.order_violations.push(format!("name {} before initial", name));
                        }
                        call.name_count += 1;
                        call.name = Some(name.clone());
                    }
                    if let Some(arguments) = &delta.function_delta.arguments {
                        if call.name_count == 0 {
                            call.order_violations
                                .push(format!("arguments {:?} before name", arguments));
                        }
                        call.arguments.push_str(arguments);
                    }
                }
            }
        }
        self.messages.push(message);
    }
}

/// Feed `chunks` through `parser` the way a serving loop would, then flush.
///
/// Token ids come from the mock tokenizer, so chunks must not split marker
/// tokens.
pub async fn run_stream<S: AsRef<str>>(parser: &dyn ToolParser, chunks: &[S]) -> StreamOutcome {
    let tokenizer = MockTokenizer::new();
    let mut outcome = StreamOutcome::default();
    let mut state = parser.new_stream_state();
    let mut text = String::new();
    let mut ids: Vec<u32> = Vec::new();

    for chunk in chunks {
        let delta_text = chunk.as_ref();
        let delta_ids = tokenizer.encode(delta_text);
        let previous_text = text.clone();
        let previous_ids = ids.clone();
        text.push_str(delta_text);
        ids.extend_from_slice(&delta_ids);

        let step = StreamChunk {
            previous_text: &previous_text,
            current_text: &text,
            delta_text,
            previous_token_ids: &previous_ids,
            current_token_ids: &ids,
            delta_token_ids: &delta_ids,
        };
        if let Some(message) = parser.parse_incremental(&mut state, &step).await {
            outcome.record(message);
        }
    }

    for message in parser.finish_stream(&mut state, &text).await {
        outcome.record(message);
    }
    outcome.state = state;
    outcome
}

/// Run one step by hand: `previous` was already seen, `delta` just arrived
pub async fn step(
    parser: &dyn ToolParser,
    state: &mut StreamState,
    previous: &str,
    delta: &str,
) -> Option<DeltaMessage> {
    let tokenizer = MockTokenizer::new();
    let current = format!("{}{}", previous, delta);
    let previous_ids = tokenizer.encode(previous);
    let current_ids = tokenizer.encode(&current);
    let delta_ids = tokenizer.encode(delta);

    let chunk = StreamChunk {
        previous_text: previous,
        current_text: &current,
        delta_text: delta,
        previous_token_ids: &previous_ids,
        current_token_ids: &current_ids,
        delta_token_ids: &delta_ids,
    };
    parser.parse_incremental(state, &chunk).await
}

/// Parse arguments text for structural comparison
pub fn json(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|e| panic!("{:?} is not JSON: {}", text, e))
}
