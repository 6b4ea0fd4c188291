use std::collections::HashSet;

use super::*;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &ToolParserConfig) -> ConfigResult<()> {
        if config.max_json_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_json_depth".to_string(),
                value: config.max_json_depth.to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for convention in &config.conventions {
            Self::validate_convention(convention)?;

            if ConventionConfig::is_builtin_name(&convention.name) {
                return Err(ConfigError::IncompatibleConfig {
                    reason: format!(
                        "Convention '{}' collides with a built-in parser",
                        convention.name
                    ),
                });
            }
            if !seen.insert(convention.name.as_str()) {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("Duplicate convention name '{}'", convention.name),
                });
            }
        }

        let known = config.parser_names();
        let is_known = |name: &str| known.iter().any(|k| k == name);

        if config.default_parser.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "default_parser".to_string(),
            });
        }
        if !is_known(&config.default_parser) {
            return Err(ConfigError::InvalidValue {
                field: "default_parser".to_string(),
                value: config.default_parser.clone(),
                reason: "Unknown parser".to_string(),
            });
        }

        for (pattern, parser) in &config.model_mappings {
            Self::validate_pattern("model_mappings", pattern)?;
            if !is_known(parser) {
                return Err(ConfigError::InvalidValue {
                    field: format!("model_mappings.{}", pattern),
                    value: parser.clone(),
                    reason: "Unknown parser".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_convention(convention: &ConventionConfig) -> ConfigResult<()> {
        if convention.name.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "conventions.name".to_string(),
            });
        }
        let field = |name: &str| format!("conventions.{}.{}", convention.name, name);

        match &convention.framing {
            FramingConfig::Tags { start, end } => {
                Self::validate_marker(&field("framing.start"), start)?;
                Self::validate_marker(&field("framing.end"), end)?;
                if start == end {
                    return Err(ConfigError::InvalidValue {
                        field: field("framing.end"),
                        value: end.clone(),
                        reason: "Must differ from the start marker".to_string(),
                    });
                }
            }
            FramingConfig::Sentinel {
                sentinel,
                separator,
                ..
            } => {
                Self::validate_marker(&field("framing.sentinel"), sentinel)?;
                if separator.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: field("framing.separator"),
                        value: separator.clone(),
                        reason: "Must contain a non-whitespace character".to_string(),
                    });
                }
            }
            FramingConfig::BraceScan => {}
        }

        if convention.name_key.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: field("name_key"),
            });
        }
        if convention.argument_keys.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: field("argument_keys"),
            });
        }
        if convention.argument_keys.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidValue {
                field: field("argument_keys"),
                value: format!("{:?}", convention.argument_keys),
                reason: "Keys must not be empty".to_string(),
            });
        }

        for pattern in &convention.model_patterns {
            Self::validate_pattern(&field("model_patterns"), pattern)?;
        }

        Ok(())
    }

    fn validate_marker(field: &str, marker: &str) -> ConfigResult<()> {
        if marker.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value: marker.to_string(),
                reason: "Marker must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn validate_pattern(field: &str, pattern: &str) -> ConfigResult<()> {
        if pattern.is_empty() || pattern == "*" {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value: pattern.to_string(),
                reason: "Model pattern must name a model or a non-empty prefix".to_string(),
            });
        }
        Ok(())
    }
}
