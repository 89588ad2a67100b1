//! Confirmation condition errors

/// Errors raised while parsing or evaluating a confirmation condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("unexpected character '{found}' at {position}")]
    UnexpectedChar { found: char, position: usize },

    #[error("unexpected token {found} at {position}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        position: usize,
    },

    #[error("unterminated string starting at {0}")]
    UnterminatedString(usize),

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
}
