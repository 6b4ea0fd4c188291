use super::{ConfigResult, ConventionConfig, ToolParserConfig};

/// Builder for ToolParserConfig that wraps the config itself
#[derive(Debug, Clone, Default)]
pub struct ToolParserConfigBuilder {
    config: ToolParserConfig,
}

impl ToolParserConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from an existing configuration (takes ownership)
    pub fn from_config(config: ToolParserConfig) -> Self {
        Self { config }
    }

    /// Create a builder from a reference to an existing configuration
    pub fn from_config_ref(config: &ToolParserConfig) -> Self {
        Self::from_config(config.clone())
    }

    pub fn default_parser(mut self, name: impl Into<String>) -> Self {
        self.config.default_parser = name.into();
        self
    }

    pub fn max_json_depth(mut self, depth: usize) -> Self {
        self.config.max_json_depth = depth;
        self
    }

    pub fn convention(mut self, convention: ConventionConfig) -> Self {
        self.config.conventions.push(convention);
        self
    }

    /// Route a model name or `prefix*` pattern to a parser
    pub fn map_model(mut self, pattern: impl Into<String>, parser: impl Into<String>) -> Self {
        self.config
            .model_mappings
            .insert(pattern.into(), parser.into());
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<ToolParserConfig> {
        self.build_with_validation(true)
    }

    /// Build the configuration without validation
    pub fn build_unchecked(self) -> ToolParserConfig {
        self.into()
    }

    /// Build with optional validation
    pub fn build_with_validation(self, validate: bool) -> ConfigResult<ToolParserConfig> {
        let config: ToolParserConfig = self.into();
        if validate {
            config.validate()?;
        }
        Ok(config)
    }
}

impl From<ToolParserConfigBuilder> for ToolParserConfig {
    fn from(builder: ToolParserConfigBuilder) -> Self {
        builder.config
    }
}

impl ToolParserConfig {
    /// Create a builder for ToolParserConfig
    pub fn builder() -> ToolParserConfigBuilder {
        ToolParserConfigBuilder::new()
    }

    /// Create a builder from this configuration
    pub fn to_builder(&self) -> ToolParserConfigBuilder {
        ToolParserConfigBuilder::from_config_ref(self)
    }
}
