//! Typed errors for the pattern language, replacement and parsing layers
//!
//! Library surfaces that callers branch on return these enums. Orchestration
//! code (workspace, engine, CLI) wraps them in `anyhow::Error` with context.

use thiserror::Error;

/// Errors raised while tokenizing or parsing search/replace patterns
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern is empty")]
    EmptyPattern,

    #[error("unclosed placeholder starting at position {position}")]
    UnclosedPlaceholder { position: usize },

    #[error("empty placeholder name at position {position}")]
    EmptyPlaceholderName { position: usize },

    #[error("invalid placeholder name '{name}' at position {position} (use letters, digits and '_')")]
    InvalidPlaceholderName { name: String, position: usize },

    #[error(
        "placeholder '${name}$' is not defined in the search pattern (available: {})",
        format_available(available)
    )]
    UndefinedPlaceholder { name: String, available: Vec<String> },

    #[error("constraint targets unknown placeholder '{name}'")]
    UnknownConstraintTarget { name: String },

    #[error("invalid constraint: {message}")]
    InvalidConstraint { message: String },
}

impl PatternError {
    pub fn invalid_constraint(message: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            message: message.into(),
        }
    }
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

/// Errors raised while rendering a replacement for a match
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplaceError {
    #[error("match has no binding for placeholder '{name}'")]
    MissingBinding { name: String },
}

/// Errors raised by language adapters
#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("failed to load {language} grammar: {message}")]
    LanguageInit { language: &'static str, message: String },

    #[error("{language} parser produced no tree")]
    ParseFailed { language: &'static str },
}
