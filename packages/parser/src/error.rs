use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unbalanced brace at {pos}")]
    UnbalancedBrace { pos: usize },

    #[error("Unterminated comment starting at {pos}")]
    UnterminatedComment { pos: usize },

    #[error("Unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },

    #[error("Invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Unexpected token at {pos}: {found}")]
    UnexpectedToken { pos: usize, found: String },

    #[error("Overlapping edits at {pos}")]
    OverlappingEdit { pos: usize },
}

impl ParseError {
    pub fn invalid_selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.into(),
        }
    }

    pub fn unexpected_token(pos: usize, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            pos,
            found: found.into(),
        }
    }

    /// Byte offset the error points at, if it has one
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::UnbalancedBrace { pos }
            | Self::UnterminatedComment { pos }
            | Self::UnterminatedString { pos }
            | Self::UnexpectedToken { pos, .. }
            | Self::OverlappingEdit { pos } => Some(*pos),
            Self::InvalidSelector { .. } => None,
        }
    }
}
