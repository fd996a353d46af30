use thiserror::Error;

use crate::value::ControlType;

/// Errors raised while parsing keys or coercing control values.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("invalid element key '{0}'")]
    InvalidKey(String),
    #[error("unknown element type '{0}'")]
    UnknownElementType(String),
    #[error("value of kind '{found}' cannot be stored in a {expected:?} control")]
    ValueTypeMismatch {
        expected: ControlType,
        found: &'static str,
    },
}

impl ApiError {
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::InvalidKey(_) | ApiError::UnknownElementType(_) => "key",
            ApiError::ValueTypeMismatch { .. } => "value",
        }
    }
}
