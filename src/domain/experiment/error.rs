//! Errors returned by the split engine

use thiserror::Error;

use crate::domain::DomainError;

/// Caller misuse of the split engine
///
/// These are programming mistakes in the calling code and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Experiments must have at least two variants (a control and an alternative), got {0}")]
    InsufficientVariants(usize),

    #[error("Duplicate variant key: '{0}'")]
    DuplicateVariantKey(String),

    #[error("Invalid weight {weight} for variant '{key}': weights must be positive integers")]
    InvalidWeight { key: String, weight: u32 },

    #[error("Got {weights} weights for {keys} variants")]
    WeightCountMismatch { keys: usize, weights: usize },

    #[error("An experiment named '{name}' already exists with different variants: {existing:?}")]
    VariantMismatch { name: String, existing: Vec<String> },
}

#[derive(Debug, Error)]
pub enum SplitError {
    /// The caller declared something invalid
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A backend or identity provider failed; passed through untouched
    #[error(transparent)]
    Collaborator(#[from] DomainError),

    #[error("Experiment '{0}' was saved but could not be read back")]
    ExperimentNotPersisted(String),

    #[error("Experiment '{experiment}' assigned unknown variant '{variant}'")]
    UnknownAssignedVariant { experiment: String, variant: String },
}

impl SplitError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_mismatch_message() {
        let error = ConfigurationError::VariantMismatch {
            name: "e".to_string(),
            existing: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "An experiment named 'e' already exists with different variants: [\"a\", \"b\"]"
        );
    }

    #[test]
    fn test_collaborator_error_is_transparent() {
        let error = SplitError::from(DomainError::storage("connection refused"));

        assert!(!error.is_configuration());
        assert_eq!(error.to_string(), "Storage error: connection refused");
    }
}
