use thiserror::Error;

/// Errors raised while parsing selectors or compiling predicate specs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("unsupported predicate '{0}'")]
    UnsupportedPredicate(String),

    #[error("'{predicate}' expects {expected}")]
    Arity {
        predicate: String,
        expected: &'static str,
    },

    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
}
