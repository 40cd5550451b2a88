//! Errors raised while constructing or parsing domain values.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A value could not be built from its raw input.
///
/// Store and transport failures never appear here; they belong to the layer
/// that performs the IO.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input was present but unacceptable (blank name, malformed email, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A stored or submitted label does not name a known variant.
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_variant_names_kind_and_value() {
        let err = DomainError::unknown("role", "janitor");
        assert_eq!(err.to_string(), "unknown role 'janitor'");
    }
}
