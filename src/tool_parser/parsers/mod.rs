/// Parser implementations for different model formats
///
/// One framing behaviour per module; conventions combine a framer with a
/// call schema through `FramedParser`.
pub mod brace;
pub mod framed;
pub mod helpers;
pub mod passthrough;
pub mod sentinel;
pub mod tags;

pub use brace::BraceFramer;
pub use framed::{CallSchema, FramedParser};
pub use passthrough::PassthroughParser;
pub use sentinel::SentinelFramer;
pub use tags::TagFramer;

/// Tag-framed parser, e.g. Hermes/Qwen `<tool_call>` blocks
pub type TagParser = FramedParser<TagFramer>;

/// Sentinel-framed parser, e.g. Mistral `[TOOL_CALLS]` or Llama `<|python_tag|>`
pub type SentinelParser = FramedParser<SentinelFramer>;

/// Brace-scanning parser, e.g. Llama 3 JSON and xLAM
pub type BraceParser = FramedParser<BraceFramer>;
