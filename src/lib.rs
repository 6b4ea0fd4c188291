pub mod config;
pub mod logging;
pub mod tokenizer;
pub mod tool_parser;
