//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Plan has no variations")]
    NoVariations,

    #[error("Duplicate variation id: {0}")]
    DuplicateVariation(String),

    #[error("Unknown variation: {0}")]
    UnknownVariation(String),

    #[error("A result for variation {0} was already recorded")]
    DuplicateResult(String),

    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },
}

impl DomainError {
    /// Check if this error came from an illegal status change
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, DomainError::InvalidTransition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_variation_display() {
        let error = DomainError::DuplicateVariation("model-0".to_string());
        assert_eq!(error.to_string(), "Duplicate variation id: model-0");
    }

    #[test]
    fn test_is_invalid_transition_check() {
        let error = DomainError::InvalidTransition {
            id: "a".to_string(),
            from: "completed".to_string(),
            to: "pending".to_string(),
        };
        assert!(error.is_invalid_transition());
        assert!(!DomainError::NoVariations.is_invalid_transition());
        assert!(!DomainError::UnknownVariation("x".to_string()).is_invalid_transition());
    }
}
