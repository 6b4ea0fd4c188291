use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Function call within a tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// Name of the function to call
    pub name: String,
    /// Arguments as canonical JSON text
    pub arguments: String,
}

/// Kind of a tool call. Only functions exist today.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallKind {
    #[default]
    Function,
}

/// Parsed tool call from model output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ToolCallKind,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(function: FunctionCall) -> Self {
        Self {
            id: generate_call_id(),
            kind: ToolCallKind::Function,
            function,
        }
    }
}

/// Generate an identifier for a tool call
pub fn generate_call_id() -> String {
    format!("chatcmpl-tool-{}", Uuid::new_v4().simple())
}

/// Outcome of one-shot extraction over a complete generation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    pub tools_called: bool,
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ExtractionResult {
    /// No call was recognized: the whole text is content.
    pub fn no_tools(text: &str) -> Self {
        Self {
            tools_called: false,
            tool_calls: Vec::new(),
            content: Some(text.to_string()),
        }
    }

    pub fn with_calls(tool_calls: Vec<ToolCall>, content: Option<String>) -> Self {
        Self {
            tools_called: !tool_calls.is_empty(),
            tool_calls,
            content,
        }
    }
}

/// Incremental part of a function call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeltaFunctionCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Streaming output unit for one tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeltaToolCall {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolCallKind>,
    #[serde(rename = "function", default)]
    pub function_delta: DeltaFunctionCall,
}

impl DeltaToolCall {
    /// First delta of a call: identity only, no name or arguments.
    pub fn initial(index: usize) -> Self {
        Self {
            index,
            id: Some(generate_call_id()),
            kind: Some(ToolCallKind::Function),
            function_delta: DeltaFunctionCall::default(),
        }
    }

    pub fn name(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            kind: None,
            function_delta: DeltaFunctionCall {
                name: Some(name.into()),
                arguments: None,
            },
        }
    }

    pub fn arguments(index: usize, arguments: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            kind: None,
            function_delta: DeltaFunctionCall {
                name: None,
                arguments: Some(arguments.into()),
            },
        }
    }

    pub fn is_initial(&self) -> bool {
        self.id.is_some()
            && self.function_delta.name.is_none()
            && self.function_delta.arguments.is_none()
    }
}

/// One streaming emission: either plain content or tool call deltas, never both
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DeltaMessage {
    Content { content: String },
    ToolCalls { tool_calls: Vec<DeltaToolCall> },
}

impl DeltaMessage {
    pub fn content(&self) -> Option<&str> {
        match self {
            DeltaMessage::Content { content } => Some(content),
            DeltaMessage::ToolCalls { .. } => None,
        }
    }

    pub fn tool_calls(&self) -> &[DeltaToolCall] {
        match self {
            DeltaMessage::Content { .. } => &[],
            DeltaMessage::ToolCalls { tool_calls } => tool_calls,
        }
    }
}

/// Input of one streaming step.
///
/// `current_text` is `previous_text + delta_text`, and likewise for the token ids.
#[derive(Debug, Clone, Copy)]
pub struct StreamChunk<'a> {
    pub previous_text: &'a str,
    pub current_text: &'a str,
    pub delta_text: &'a str,
    pub previous_token_ids: &'a [u32],
    pub current_token_ids: &'a [u32],
    pub delta_token_ids: &'a [u32],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_wire_shape() {
        let delta = DeltaMessage::ToolCalls {
            tool_calls: vec![DeltaToolCall::name(0, "get_weather")],
        };
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tool_calls": [{"index": 0, "function": {"name": "get_weather"}}]})
        );

        let content = DeltaMessage::Content {
            content: "hi".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            serde_json::json!({"content": "hi"})
        );
    }

    #[test]
    fn test_initial_delta_carries_identity_only() {
        let delta = DeltaToolCall::initial(2);
        assert!(delta.is_initial());
        assert_eq!(delta.kind, Some(ToolCallKind::Function));
        assert!(delta.id.as_deref().unwrap().starts_with("chatcmpl-tool-"));

        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"], serde_json::json!({}));
    }

    #[test]
    fn test_extraction_result_flag_tracks_calls() {
        let empty = ExtractionResult::with_calls(vec![], None);
        assert!(!empty.tools_called);

        let call = ToolCall::new(FunctionCall {
            name: "f".to_string(),
            arguments: "{}".to_string(),
        });
        let result = ExtractionResult::with_calls(vec![call], None);
        assert!(result.tools_called);
        assert_eq!(result.tool_calls[0].kind, ToolCallKind::Function);
    }
}
