//! Configuration errors.
//!
//! All of these are fatal at construction time. A rule whose pattern does
//! not compile, or whose examples do not behave as declared, must never
//! reach evaluation.

/// Errors that can occur while loading and validating rule definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid pattern for rule '{rule}': {message}")]
    InvalidPattern { rule: String, message: String },

    #[error("Match example for rule '{rule}' did not match: {example:?}")]
    ExampleDidNotMatch { rule: String, example: String },

    #[error("Non-match example for rule '{rule}' matched: {example:?}")]
    ExampleMatched { rule: String, example: String },

    #[error("Rule '{rule}' is missing required field '{field}'")]
    MissingField { rule: String, field: String },

    #[error("Invalid value for '{field}' in rule '{rule}': {message}")]
    InvalidValue {
        rule: String,
        field: String,
        message: String,
    },

    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Config parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Duplicate rule name '{rule}'")]
    DuplicateRule { rule: String },
}
