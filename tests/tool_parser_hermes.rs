//! Hermes / Qwen Parser Integration Tests
//!
//! Calls wrapped in `<tool_call>` tags, one-shot and streaming

use serde_json::json;

mod common;
use common::{
    create_parser, json, run_stream,
    streaming_helpers::{char_chunks, chunks_of, strategic_chunks},
};

const WEATHER: &str = "Let me check.\n<tool_call>\n{\"name\": \"get_weather\", \"arguments\": {\"city\": \"Paris\", \"days\": 3}}\n</tool_call>";

#[tokio::test]
async fn test_hermes_single_call() {
    let parser = create_parser("hermes");
    let result = parser.parse_complete(WEATHER).await.unwrap();

    assert!(result.tools_called);
    assert_eq!(result.tool_calls.len(), 1);
    let call = &result.tool_calls[0];
    assert_eq!(call.function.name, "get_weather");
    assert_eq!(call.function.arguments, r#"{"city": "Paris", "days": 3}"#);
    assert!(call.id.starts_with("chatcmpl-tool-"));
    assert_eq!(result.content.as_deref(), Some("Let me check.\n"));
}

#[tokio::test]
async fn test_hermes_multiple_calls_keep_order() {
    let parser = create_parser("hermes");
    let input = r#"<tool_call>
{"name": "search", "arguments": {"query": "rust"}}
</tool_call>
<tool_call>
{"name": "translate", "arguments": {"text": "hi", "to": "fr"}}
</tool_call>"#;

    let result = parser.parse_complete(input).await.unwrap();
    assert_eq!(result.tool_calls.len(), 2);
    assert_eq!(result.tool_calls[0].function.name, "search");
    assert_eq!(result.tool_calls[1].function.name, "translate");
    assert_ne!(result.tool_calls[0].id, result.tool_calls[1].id);
    assert_eq!(result.content, None);
}

#[tokio::test]
async fn test_hermes_malformed_call_is_skipped() {
    let parser = create_parser("hermes");
    let input = r#"<tool_call>{"name": "broken", "arguments": {"x": }</tool_call>
<tool_call>{"name": "ok", "arguments": {"x": 1}}</tool_call>"#;

    let result = parser.parse_complete(input).await.unwrap();
    assert!(result.tools_called);
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].function.name, "ok");
}

#[tokio::test]
async fn test_hermes_only_malformed_calls_yield_content() {
    let parser = create_parser("hermes");
    let input = r#"<tool_call>{"name": "broken"</tool_call>"#;

    let result = parser.parse_complete(input).await.unwrap();
    assert!(!result.tools_called);
    assert!(result.tool_calls.is_empty());
    assert_eq!(result.content.as_deref(), Some(input));
}

#[tokio::test]
async fn test_hermes_content_after_calls_is_kept() {
    let parser = create_parser("hermes");
    let input = r#"Before <tool_call>{"name": "f", "arguments": {}}</tool_call> after"#;

    let result = parser.parse_complete(input).await.unwrap();
    assert_eq!(result.tool_calls[0].function.arguments, "{}");
    assert_eq!(result.content.as_deref(), Some("Before  after"));
}

#[tokio::test]
async fn test_hermes_unterminated_call_in_complete_output() {
    let parser = create_parser("hermes");
    let input = r#"<tool_call>{"name": "f", "arguments": {"a": [1, 2]}}"#;

    let result = parser.parse_complete(input).await.unwrap();
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].function.arguments, r#"{"a": [1, 2]}"#);
}

#[tokio::test]
async fn test_hermes_streaming_reconstructs_call() {
    let parser = create_parser("hermes");

    for chunks in [chunks_of(WEATHER, 3), char_chunks(WEATHER), strategic_chunks(WEATHER)] {
        let outcome = run_stream(parser.as_ref(), &chunks).await;
        outcome.assert_well_formed();

        assert_eq!(outcome.content, "Let me check.\n");
        assert_eq!(outcome.calls.len(), 1);
        let call = outcome.call(0);
        assert_eq!(call.name.as_deref(), Some("get_weather"));
        assert_eq!(call.arguments, r#"{"city": "Paris", "days": 3}"#);
    }
}

#[tokio::test]
async fn test_hermes_streaming_never_reveals_open_strings() {
    let parser = create_parser("hermes");
    let chunks = [
        "<tool_call>",
        r#"{"name": "get_weather", "#,
        r#""arguments": "#,
        r#"{"city": "Par"#,
        r#"is"}}"#,
        "</tool_call>",
    ];

    let outcome = run_stream(parser.as_ref(), &chunks).await;
    outcome.assert_well_formed();

    let fragments: Vec<&str> = outcome
        .messages
        .iter()
        .flat_map(|message| message.tool_calls())
        .filter_map(|delta| delta.function_delta.arguments.as_deref())
        .collect();
    assert_eq!(fragments, vec![r#"{"city": "Par"#, r#"is"}"#]);
}

#[tokio::test]
async fn test_hermes_streaming_two_calls() {
    let parser = create_parser("hermes");
    let input = "<tool_call>{\"name\": \"a\", \"arguments\": {\"x\": 1}}</tool_call>\n<tool_call>{\"name\": \"b\", \"arguments\": {\"y\": \"z\"}}</tool_call>";

    let outcome = run_stream(parser.as_ref(), &chunks_of(input, 4)).await;
    outcome.assert_well_formed();

    assert_eq!(outcome.names(), vec!["a", "b"]);
    assert_eq!(outcome.call(0).arguments_json(), json!({"x": 1}));
    assert_eq!(outcome.call(1).arguments_json(), json!({"y": "z"}));
    assert_eq!(outcome.content, "\n");
    assert_eq!(outcome.state.current_index, 1);
}

#[tokio::test]
async fn test_hermes_call_body_in_single_chunk() {
    let parser = create_parser("hermes");
    let chunks = [
        "<tool_call>",
        r#"{"name": "f", "arguments": {"k": "v"}}"#,
        "</tool_call>",
    ];

    let outcome = run_stream(parser.as_ref(), &chunks).await;
    outcome.assert_well_formed();

    // the initial delta goes out alone, the closing tag flushes the rest
    assert_eq!(outcome.messages.len(), 2);
    assert_eq!(outcome.messages[0].tool_calls().len(), 1);
    assert!(outcome.messages[0].tool_calls()[0].is_initial());
    assert_eq!(outcome.messages[1].tool_calls().len(), 2);
    assert_eq!(outcome.call(0).arguments, r#"{"k": "v"}"#);
}

#[tokio::test]
async fn test_hermes_stream_cut_off_is_flushed() {
    let parser = create_parser("hermes");
    let chunks = ["<tool_call>", r#"{"name": "f", "arguments": {"n": 4"#, "2}}"];

    let outcome = run_stream(parser.as_ref(), &chunks).await;
    outcome.assert_well_formed();
    assert_eq!(json(&outcome.call(0).arguments), json!({"n": 42}));
}

#[tokio::test]
async fn test_hermes_one_delta_kind_per_step() {
    let parser = create_parser("hermes");
    let chunks = ["<tool_call>", "{", r#""name": "get_w"#, r#"eather", "#, r#""arguments": {"#, r#""city": "Rome"}}"#];

    let outcome = run_stream(parser.as_ref(), &chunks).await;
    outcome.assert_well_formed();

    let kinds: Vec<&str> = outcome
        .messages
        .iter()
        .map(|message| {
            let deltas = message.tool_calls();
            assert_eq!(deltas.len(), 1, "one delta per step: {:?}", message);
            match &deltas[0] {
                delta if delta.is_initial() => "initial",
                delta if delta.function_delta.name.is_some() => "name",
                _ => "arguments",
            }
        })
        .collect();
    assert_eq!(kinds, vec!["initial", "name", "arguments"]);
    assert_eq!(outcome.call(0).arguments, r#"{"city": "Rome"}"#);
}
