/// Tool parser module for handling function/tool calls in model outputs
///
/// This module provides infrastructure for parsing tool calls from various model formats.
// Core modules
pub mod canonical;
pub mod diff;
pub mod errors;
pub mod factory;
pub mod partial_json;
pub mod state;
pub mod traits;
pub mod types;

// Parser implementations
pub mod parsers;

// Re-export types used outside this module
pub use errors::{ParserError, ParserResult};
pub use factory::{ParserCreator, ParserRegistry};
pub use parsers::{
    BraceFramer, BraceParser, CallSchema, FramedParser, PassthroughParser, SentinelFramer,
    SentinelParser, TagFramer, TagParser,
};
pub use partial_json::{Allow, PartialJson, PartialValue};
pub use state::StreamState;
pub use traits::{CallFramer, ToolParser};
pub use types::{
    DeltaFunctionCall, DeltaMessage, DeltaToolCall, ExtractionResult, FunctionCall, StreamChunk,
    ToolCall, ToolCallKind,
};
