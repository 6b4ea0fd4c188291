use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult, ConfigValidator};

/// Name of the parser that never detects tool calls
pub const PASSTHROUGH_PARSER: &str = "passthrough";

/// Tool parser configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParserConfig {
    /// Parser used for models without a mapping
    #[serde(default = "default_parser")]
    pub default_parser: String,
    /// Nesting limit of the tolerant JSON reader
    #[serde(default = "default_max_json_depth")]
    pub max_json_depth: usize,
    /// Conventions registered next to the built-in ones
    #[serde(default)]
    pub conventions: Vec<ConventionConfig>,
    /// Model name or `prefix*` pattern to parser name
    #[serde(default)]
    pub model_mappings: HashMap<String, String>,
}

fn default_parser() -> String {
    PASSTHROUGH_PARSER.to_string()
}

fn default_max_json_depth() -> usize {
    32
}

impl Default for ToolParserConfig {
    fn default() -> Self {
        Self {
            default_parser: default_parser(),
            max_json_depth: default_max_json_depth(),
            conventions: Vec::new(),
            model_mappings: HashMap::new(),
        }
    }
}

impl ToolParserConfig {
    /// Load and validate a configuration from JSON
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: ToolParserConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        ConfigValidator::validate(self)
    }

    /// Every parser name this configuration makes available
    pub fn parser_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ConventionConfig::builtin()
            .into_iter()
            .map(|convention| convention.name)
            .chain(self.conventions.iter().map(|c| c.name.clone()))
            .collect();
        names.push(PASSTHROUGH_PARSER.to_string());
        names
    }
}

/// How calls are delimited in model output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum FramingConfig {
    /// `start` ... `end` around each call
    #[serde(rename = "tags")]
    Tags { start: String, end: String },
    /// Output opens with `sentinel`; calls are split at top-level `separator`
    #[serde(rename = "sentinel")]
    Sentinel {
        sentinel: String,
        separator: String,
        /// Calls form a JSON array after the sentinel
        #[serde(default)]
        bracketed: bool,
    },
    /// Bare JSON objects anywhere in the output
    #[serde(rename = "brace_scan")]
    BraceScan,
}

impl FramingConfig {
    pub fn name(&self) -> &'static str {
        match self {
            FramingConfig::Tags { .. } => "tags",
            FramingConfig::Sentinel { .. } => "sentinel",
            FramingConfig::BraceScan => "brace_scan",
        }
    }

    /// Marker strings that must exist as vocabulary tokens
    pub fn marker_tokens(&self) -> Vec<&str> {
        match self {
            FramingConfig::Tags { start, end } => vec![start.as_str(), end.as_str()],
            FramingConfig::Sentinel { sentinel, .. } => vec![sentinel.as_str()],
            FramingConfig::BraceScan => Vec::new(),
        }
    }
}

/// A named tool call convention: framing plus the field names of a call object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConventionConfig {
    pub name: String,
    pub framing: FramingConfig,
    #[serde(default = "default_name_key")]
    pub name_key: String,
    /// Keys accepted for the arguments object, first match wins
    #[serde(default = "default_argument_keys")]
    pub argument_keys: Vec<String>,
    /// Model patterns routed to this convention
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub model_patterns: Vec<String>,
}

fn default_name_key() -> String {
    "name".to_string()
}

fn default_argument_keys() -> Vec<String> {
    vec!["arguments".to_string()]
}

impl ConventionConfig {
    pub fn new(name: impl Into<String>, framing: FramingConfig) -> Self {
        Self {
            name: name.into(),
            framing,
            name_key: default_name_key(),
            argument_keys: default_argument_keys(),
            model_patterns: Vec::new(),
        }
    }

    pub fn with_argument_keys(mut self, keys: &[&str]) -> Self {
        self.argument_keys = keys.iter().map(|key| key.to_string()).collect();
        self
    }

    pub fn with_model_patterns(mut self, patterns: &[&str]) -> Self {
        self.model_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Conventions available without any configuration
    pub fn builtin() -> Vec<ConventionConfig> {
        vec![
            ConventionConfig::new(
                "hermes",
                FramingConfig::Tags {
                    start: "<tool_call>".to_string(),
                    end: "</tool_call>".to_string(),
                },
            )
            .with_model_patterns(&["qwen*", "Qwen*", "hermes*", "NousResearch/Hermes*"]),
            ConventionConfig::new(
                "mistral",
                FramingConfig::Sentinel {
                    sentinel: "[TOOL_CALLS]".to_string(),
                    separator: ",".to_string(),
                    bracketed: true,
                },
            )
            .with_model_patterns(&["mistral-*", "mixtral-*"]),
            ConventionConfig::new("llama3_json", FramingConfig::BraceScan)
                .with_argument_keys(&["parameters", "arguments"])
                .with_model_patterns(&["llama-3*", "meta-llama/Llama-3*", "meta-llama-3*"]),
            ConventionConfig::new(
                "llama3_python_tag",
                FramingConfig::Sentinel {
                    sentinel: "<|python_tag|>".to_string(),
                    separator: ";".to_string(),
                    bracketed: false,
                },
            )
            .with_argument_keys(&["parameters", "arguments"]),
            ConventionConfig::new("xlam", FramingConfig::BraceScan)
                .with_model_patterns(&["xlam*", "Salesforce/xLAM*"]),
        ]
    }

    pub fn is_builtin_name(name: &str) -> bool {
        name == PASSTHROUGH_PARSER
            || Self::builtin()
                .iter()
                .any(|convention| convention.name == name)
    }
}
