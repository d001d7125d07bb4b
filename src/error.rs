use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImpactError {
    /// Malformed or out-of-range request input.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unknown {kind}: '{key}'")]
    NotFound { kind: String, key: String },

    /// The reference data is missing something every calculation needs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Reference store error: {0}")]
    Store(String),
}

impl ImpactError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: key.into(),
        }
    }

    /// True for errors caused by the request rather than the deployment.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for ImpactError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<ImpactError> for String {
    fn from(err: ImpactError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_distinct_from_operational_errors() {
        assert!(ImpactError::validation("composition", "empty").is_user_error());
        assert!(ImpactError::not_found("clothing type", "cape").is_user_error());
        assert!(!ImpactError::Configuration("missing".into()).is_user_error());
        assert!(!ImpactError::Computation("zero".into()).is_user_error());
        assert!(!ImpactError::Store("io".into()).is_user_error());
    }

    #[test]
    fn test_display_messages() {
        let err = ImpactError::not_found("clothing type", "cape");
        assert_eq!(err.to_string(), "Unknown clothing type: 'cape'");

        let err = ImpactError::validation("override_weight_grams", "outside 100-250g");
        let msg: String = err.into();
        assert!(msg.contains("override_weight_grams"));
    }
}
