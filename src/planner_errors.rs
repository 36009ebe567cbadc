//! # Planner Error Types Module
//!
//! This module defines the error types used across meal planning. Errors on the
//! generation path (`RepairError`, `ValidationError`, `CapabilityError`) never leave
//! the recipe synthesizer; `DivisionError` and `StoreError` are surfaced to callers.

use std::fmt;

/// Failure to locate anything JSON-like in generated text
#[derive(Debug, Clone, PartialEq)]
pub enum RepairError {
    /// No `{ ... }` span could be found
    ParseFailure(String),
}

impl fmt::Display for RepairError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairError::ParseFailure(msg) => write!(f, "Parse failure: {msg}"),
        }
    }
}

impl std::error::Error for RepairError {}

/// An extracted field that could not be coerced to its domain type
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `ingredients[2].amount`)
    pub field: String,
    /// What was wrong with it
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation error on '{}': {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised by the text-generation capability
#[derive(Debug)]
pub enum CapabilityError {
    /// Transport-level failure (connection refused, DNS, TLS...)
    Network(reqwest::Error),
    /// The request did not complete in time
    Timeout,
    /// The service answered with a non-success status
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    /// The service answered but the envelope could not be decoded
    MalformedEnvelope(String),
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::Network(err) => write!(f, "Network error: {err}"),
            CapabilityError::Timeout => write!(f, "Generation request timed out"),
            CapabilityError::Status { status, body } => {
                write!(f, "Generation service returned {status}: {body}")
            }
            CapabilityError::MalformedEnvelope(msg) => write!(f, "Malformed response envelope: {msg}"),
        }
    }
}

impl std::error::Error for CapabilityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CapabilityError::Network(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CapabilityError::Timeout
        } else if err.is_decode() {
            CapabilityError::MalformedEnvelope(err.to_string())
        } else {
            CapabilityError::Network(err)
        }
    }
}

/// Recipe scaling requested with a non-positive serving count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisionError {
    pub servings: u32,
    pub target: u32,
}

impl fmt::Display for DivisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot scale recipe from {} to {} servings: serving counts must be positive",
            self.servings, self.target
        )
    }
}

impl std::error::Error for DivisionError {}

/// Any failure on the generation path, prior to fallback substitution
#[derive(Debug)]
pub enum GenerationError {
    Capability(CapabilityError),
    Repair(RepairError),
    Validation(ValidationError),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Capability(err) => write!(f, "{err}"),
            GenerationError::Repair(err) => write!(f, "{err}"),
            GenerationError::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for GenerationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerationError::Capability(err) => Some(err),
            GenerationError::Repair(err) => Some(err),
            GenerationError::Validation(err) => Some(err),
        }
    }
}

impl From<CapabilityError> for GenerationError {
    fn from(err: CapabilityError) -> Self {
        GenerationError::Capability(err)
    }
}

impl From<RepairError> for GenerationError {
    fn from(err: RepairError) -> Self {
        GenerationError::Repair(err)
    }
}

impl From<ValidationError> for GenerationError {
    fn from(err: ValidationError) -> Self {
        GenerationError::Validation(err)
    }
}

/// Persistence failures
#[derive(Debug)]
pub enum StoreError {
    Database(sqlx::Error),
    Serialization(serde_json::Error),
    /// A stored row no longer maps onto the domain model
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(err) => write!(f, "Database error: {err}"),
            StoreError::Serialization(err) => write!(f, "Serialization error: {err}"),
            StoreError::Corrupt(msg) => write!(f, "Corrupt stored record: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(err) => Some(err),
            StoreError::Serialization(err) => Some(err),
            StoreError::Corrupt(_) => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepairError::ParseFailure("no JSON object found".to_string());
        assert_eq!(err.to_string(), "Parse failure: no JSON object found");

        let err = ValidationError::new("ingredients[0].amount", "not a number");
        assert_eq!(
            err.to_string(),
            "Validation error on 'ingredients[0].amount': not a number"
        );

        let err = DivisionError { servings: 0, target: 2 };
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn test_generation_error_wraps_sources() {
        let err: GenerationError = CapabilityError::Timeout.into();
        assert!(matches!(err, GenerationError::Capability(CapabilityError::Timeout)));
        assert!(std::error::Error::source(&err).is_some());

        let err: GenerationError = ValidationError::new("name", "expected string").into();
        assert!(err.to_string().contains("name"));
    }
}
