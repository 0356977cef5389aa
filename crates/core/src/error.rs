//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Deterministic business failures only. Storage and transport errors are
/// modelled in the infra and api crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. a rating outside `0..=5`).
    #[error("validation failed: {0}")]
    Validation(String),

    /// One or more required fields were empty.
    #[error("please fill in all fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// A uniqueness rule within an aggregate was violated
    /// (e.g. a second review by the same user).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (stream already exists, stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting user may not perform this command.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Builds a `MissingFields` error, or `None` when nothing is missing.
    pub fn missing_fields<I, S>(fields: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            None
        } else {
            Some(Self::MissingFields(fields))
        }
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_is_none_when_all_present() {
        assert!(DomainError::missing_fields(Vec::<String>::new()).is_none());
    }

    #[test]
    fn missing_fields_lists_every_field() {
        let err = DomainError::missing_fields(["name", "price"]).unwrap();
        assert_eq!(err.to_string(), "please fill in all fields: name, price");
    }
}
