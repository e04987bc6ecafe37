//! Error types for the editor

use ncd_parser::ParseError;
use thiserror::Error;

pub type EditResult<T> = Result<T, EditError>;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid version {requested}: current version is {current}")]
    InvalidVersion { requested: i64, current: u64 },

    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Diff not found: version {0}")]
    DiffNotFound(u64),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Navigation container not found in {0}")]
    NavigationNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EditError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ComponentNotFound(_) => "COMPONENT_NOT_FOUND",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::InvalidSelector(_) => "INVALID_SELECTOR",
            Self::InvalidVersion { .. } => "INVALID_VERSION",
            Self::DuplicateIdentifier(_) => "DUPLICATE_IDENTIFIER",
            Self::DiffNotFound(_) => "DIFF_NOT_FOUND",
            Self::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            Self::NavigationNotFound(_) => "NAVIGATION_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// HTTP-style status for API layers
    pub fn status(&self) -> u16 {
        match self {
            Self::ComponentNotFound(_) | Self::DiffNotFound(_) | Self::DocumentNotFound(_) => 404,
            Self::InvalidOperation(_) | Self::InvalidVersion { .. } => 400,
            Self::InvalidSelector(_) | Self::NavigationNotFound(_) => 422,
            Self::DuplicateIdentifier(_) => 409,
            Self::Io(_) | Self::Serialization(_) => 500,
        }
    }
}

impl From<ParseError> for EditError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::OverlappingEdit { .. } => EditError::InvalidOperation(e.to_string()),
            other => EditError::InvalidSelector(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = EditError::ComponentNotFound("ncd-0001".into());
        assert_eq!(err.code(), "COMPONENT_NOT_FOUND");
        assert_eq!(err.status(), 404);

        let err = EditError::InvalidVersion { requested: 9, current: 3 };
        assert_eq!(err.code(), "INVALID_VERSION");
        assert_eq!(err.to_string(), "Invalid version 9: current version is 3");
    }

    #[test]
    fn test_css_errors_map_to_invalid_selector() {
        let err: EditError = ParseError::UnbalancedBrace { pos: 4 }.into();
        assert!(matches!(err, EditError::InvalidSelector(_)));
        assert_eq!(err.status(), 422);
    }
}
