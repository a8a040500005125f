//! Template error types

use thiserror::Error;

/// Errors that can occur while rendering a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Missing variable: {name}")]
    MissingVariable { name: String },

    #[error("Invalid placeholder in line {line}, col {column}")]
    InvalidPlaceholder { line: usize, column: usize },
}

impl TemplateError {
    /// Name of the unresolved placeholder, if this is a missing variable
    pub fn missing_name(&self) -> Option<&str> {
        match self {
            Self::MissingVariable { name } => Some(name),
            Self::InvalidPlaceholder { .. } => None,
        }
    }
}
