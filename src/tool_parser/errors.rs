use thiserror::Error;

/// Result type for tool parser operations
pub type ParserResult<T> = Result<T, ParserError>;

/// Errors that can occur during tool parsing
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Parsing failed: {0}")]
    ParsingFailed(String),

    /// Input ended inside a construct the caller did not allow to be incomplete
    #[error("Incomplete input")]
    Incomplete,

    #[error("Parse depth exceeded: max {0}")]
    DepthExceeded(usize),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Unknown tool parser: {0}")]
    UnknownParser(String),

    #[error("Tool parser '{parser}' requires token '{token}' which is missing from the vocabulary")]
    MissingMarkerToken { parser: String, token: String },

    #[error("Streaming invariant violated: {0}")]
    InvariantViolation(String),
}

impl ParserError {
    /// Errors that must stop a deployment at construction time.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ParserError::UnknownParser(_) | ParserError::MissingMarkerToken { .. }
        )
    }
}
