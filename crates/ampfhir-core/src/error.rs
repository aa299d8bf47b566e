use thiserror::Error;

/// Errors interpreting record JSON, ids and type names.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid FHIR resource type: {0}")]
    InvalidResourceType(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid resource data: {message}")]
    InvalidResource { message: String },

    #[error("Unknown {element} status: {value}")]
    UnknownStatus { element: &'static str, value: String },
}

impl CoreError {
    pub fn invalid_resource_type(resource_type: impl Into<String>) -> Self {
        Self::InvalidResourceType(resource_type.into())
    }

    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    pub fn unknown_status(element: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownStatus {
            element,
            value: value.into(),
        }
    }

    /// Every core error stems from malformed input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidResourceType(_)
                | Self::InvalidResource { .. }
                | Self::UnknownStatus { .. }
                | Self::JsonError(_)
        )
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_resource_type("Encounter");
        assert_eq!(err.to_string(), "Invalid FHIR resource type: Encounter");

        let err = CoreError::unknown_status("ServiceRequest", "bogus");
        assert_eq!(err.to_string(), "Unknown ServiceRequest status: bogus");
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::invalid_resource_type("Encounter").is_client_error());
        assert!(CoreError::invalid_resource("missing id").is_client_error());
    }
}
