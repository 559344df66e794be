use thiserror::Error;

/// Failures raised by collaborators (storage backends, identity providers)
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("Attribute 'visitor_id' not found");
        assert_eq!(
            error.to_string(),
            "Not found: Attribute 'visitor_id' not found"
        );
    }

    #[test]
    fn test_storage_error() {
        let error = DomainError::storage("connection reset");
        assert_eq!(error.to_string(), "Storage error: connection reset");
    }

    #[test]
    fn test_conflict_error() {
        let error = DomainError::conflict("Entity with key 'exp' already exists");
        assert_eq!(
            error.to_string(),
            "Conflict: Entity with key 'exp' already exists"
        );
    }
}
