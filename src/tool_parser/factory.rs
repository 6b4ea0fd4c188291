// Factory and registry for creating model-specific tool parsers
use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};

use crate::{
    config::{ConfigError, ConfigResult, ConventionConfig, FramingConfig, ToolParserConfig},
    tokenizer::Vocabulary,
    tool_parser::{
        errors::{ParserError, ParserResult},
        parsers::{
            BraceFramer, CallSchema, FramedParser, PassthroughParser, SentinelFramer, TagFramer,
        },
        partial_json::DEFAULT_MAX_DEPTH,
        traits::{CallFramer, ToolParser},
    },
};

/// Type alias for parser creator functions.
///
/// A creator receives the tokenizer vocabulary so it can bind marker tokens;
/// a missing marker fails construction.
pub type ParserCreator =
    Arc<dyn Fn(&dyn Vocabulary) -> ParserResult<Box<dyn ToolParser>> + Send + Sync>;

/// Registry of parser constructors and model mappings.
///
/// Built once at startup and shared as `Arc<ParserRegistry>`; lookups need no
/// locking because nothing mutates it after construction.
#[derive(Clone)]
pub struct ParserRegistry {
    /// Creator functions for parsers (used when we need a fresh instance)
    creators: HashMap<String, ParserCreator>,
    /// Model pattern to parser name mappings
    model_mapping: HashMap<String, String>,
    /// Default parser name
    default_parser: String,
}

impl ParserRegistry {
    /// Registry holding only the passthrough parser
    pub fn new() -> Self {
        let mut registry = Self {
            creators: HashMap::new(),
            model_mapping: HashMap::new(),
            default_parser: PassthroughParser::NAME.to_string(),
        };
        registry.register_parser(PassthroughParser::NAME, |_vocab: &dyn Vocabulary| {
            Ok(Box::new(PassthroughParser::new()) as Box<dyn ToolParser>)
        });
        registry
    }

    /// Registry with every built-in convention and its default model mappings
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for convention in ConventionConfig::builtin() {
            // Built-in markers are fixed literals, so the regex always compiles
            if let Err(e) = registry.register_convention(&convention, DEFAULT_MAX_DEPTH) {
                debug!(parser = %convention.name, error = %e, "skipping built-in convention");
            }
        }
        registry
    }

    /// Validate a configuration and build the registry it describes
    pub fn from_config(config: &ToolParserConfig) -> ConfigResult<Self> {
        config.validate()?;

        let mut registry = Self::new();
        for convention in ConventionConfig::builtin()
            .iter()
            .chain(config.conventions.iter())
        {
            registry
                .register_convention(convention, config.max_json_depth)
                .map_err(|e| ConfigError::InvalidValue {
                    field: format!("conventions.{}.framing", convention.name),
                    value: convention.framing.name().to_string(),
                    reason: e.to_string(),
                })?;
        }

        for (pattern, parser) in &config.model_mappings {
            registry.map_model(pattern, parser);
        }
        registry.set_default_parser(&config.default_parser);

        info!(
            parsers = registry.creators.len(),
            mappings = registry.model_mapping.len(),
            default_parser = %registry.default_parser,
            "tool parser registry initialized"
        );
        Ok(registry)
    }

    /// Register a parser creator for a given parser type.
    pub fn register_parser<F>(&mut self, name: &str, creator: F)
    where
        F: Fn(&dyn Vocabulary) -> ParserResult<Box<dyn ToolParser>> + Send + Sync + 'static,
    {
        self.creators.insert(name.to_string(), Arc::new(creator));
    }

    /// Register a convention described by data, plus its model patterns
    pub fn register_convention(
        &mut self,
        convention: &ConventionConfig,
        max_json_depth: usize,
    ) -> ParserResult<()> {
        let schema = CallSchema::new(
            convention.name_key.clone(),
            convention.argument_keys.iter().cloned(),
        );

        let creator = match &convention.framing {
            FramingConfig::Tags { start, end } => framed_creator(
                &convention.name,
                TagFramer::new(start.clone(), end.clone())?,
                schema,
                max_json_depth,
            ),
            FramingConfig::Sentinel {
                sentinel,
                separator,
                bracketed,
            } => framed_creator(
                &convention.name,
                SentinelFramer::new(sentinel.clone(), separator, *bracketed),
                schema,
                max_json_depth,
            ),
            FramingConfig::BraceScan => framed_creator(
                &convention.name,
                BraceFramer::new(),
                schema,
                max_json_depth,
            ),
        };
        self.creators.insert(convention.name.clone(), creator);

        for pattern in &convention.model_patterns {
            self.map_model(pattern, &convention.name);
        }
        Ok(())
    }

    /// Map a model name or `prefix*` pattern to a parser
    pub fn map_model(&mut self, model: impl Into<String>, parser: impl Into<String>) {
        self.model_mapping.insert(model.into(), parser.into());
    }

    /// Set the default parser to use when no match is found
    pub fn set_default_parser(&mut self, name: impl Into<String>) {
        self.default_parser = name.into();
    }

    pub fn default_parser(&self) -> &str {
        &self.default_parser
    }

    /// Check if a parser with the given name is registered
    pub fn has_parser(&self, name: &str) -> bool {
        self.creators.contains_key(name)
    }

    /// List all registered parsers, sorted by name
    pub fn list_parsers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.creators.keys().cloned().collect();
        names.sort();
        names
    }

    /// Create a fresh parser instance by exact name, binding its markers
    pub fn create_parser(
        &self,
        name: &str,
        vocab: &dyn Vocabulary,
    ) -> ParserResult<Box<dyn ToolParser>> {
        let creator = self
            .creators
            .get(name)
            .ok_or_else(|| ParserError::UnknownParser(name.to_string()))?;
        creator(vocab)
    }

    /// Parser name for a model: exact match, then longest prefix pattern
    pub fn resolve_model(&self, model: &str) -> Option<&str> {
        if let Some(parser) = self.model_mapping.get(model) {
            return Some(parser.as_str());
        }

        self.model_mapping
            .iter()
            .filter_map(|(pattern, parser)| {
                let prefix = pattern.strip_suffix('*')?;
                model.starts_with(prefix).then_some((prefix.len(), parser))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, parser)| parser.as_str())
    }

    /// Check if a specific model is routed to a parser (exact or pattern)
    pub fn has_parser_for_model(&self, model: &str) -> bool {
        self.resolve_model(model)
            .is_some_and(|parser| self.has_parser(parser))
    }

    /// Create a parser for a model, falling back to the default parser
    pub fn create_for_model(
        &self,
        model: &str,
        vocab: &dyn Vocabulary,
    ) -> ParserResult<Box<dyn ToolParser>> {
        let name = self.resolve_model(model).unwrap_or(&self.default_parser);
        debug!(model, parser = name, "resolved tool parser");
        self.create_parser(name, vocab)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Creator that clones a prototype framer and binds it to the vocabulary
fn framed_creator<F: CallFramer>(
    name: &str,
    prototype: F,
    schema: CallSchema,
    max_json_depth: usize,
) -> ParserCreator {
    let name = name.to_string();
    Arc::new(move |vocab: &dyn Vocabulary| {
        let mut framer = prototype.clone();
        framer.bind(&name, vocab)?;
        let parser = FramedParser::new(name.clone(), framer, schema.clone())
            .with_max_depth(max_json_depth);
        Ok(Box::new(parser) as Box<dyn ToolParser>)
    })
}
