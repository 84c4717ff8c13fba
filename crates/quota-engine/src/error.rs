//! Error types for the quota engine
//!
//! Fetch failures are terminal for an engine instance. Field invalidity is
//! never an error: it is observable state on the field editors.

use thiserror::Error;

/// Main error type for engine, scheme and adapter operations
#[derive(Error, Debug)]
pub enum QuotaError {
    /// A loading-phase lookup failed; the message is surfaced verbatim
    #[error("{0}")]
    Fetch(String),

    /// An edit was attempted before the engine reached `Ready`
    #[error("Engine is not ready: {0}")]
    NotReady(String),

    /// An operation is not allowed in the current engine state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The named resource object is not declared by the scheme
    #[error("Unknown resource object '{0}'")]
    UnknownObject(String),

    /// The parameter is not declared for its resource object
    #[error("Unknown parameter '{parameter}' in resource object '{object}'")]
    UnknownParameter { object: String, parameter: String },

    /// The label is not declared by the scheme
    #[error("Unknown label '{0}'")]
    UnknownLabel(String),

    /// Unit selection on a field whose units are fixed or absent
    #[error("Units of field '{0}' are not selectable")]
    UnitsNotSelectable(String),

    /// Invalid input data or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File access or I/O error
    #[error("File error: {0}")]
    FileError(String),

    /// Document parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl QuotaError {
    /// Create a fetch failure
    pub fn fetch(msg: impl Into<String>) -> Self {
        QuotaError::Fetch(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        QuotaError::InvalidInput(msg.into())
    }

    /// Create a file error
    pub fn file_error(msg: impl Into<String>) -> Self {
        QuotaError::FileError(msg.into())
    }

    /// Create a parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        QuotaError::ParseError(msg.into())
    }

    /// Create an unknown parameter error
    pub fn unknown_parameter(object: impl Into<String>, parameter: impl Into<String>) -> Self {
        QuotaError::UnknownParameter {
            object: object.into(),
            parameter: parameter.into(),
        }
    }

    /// Whether this error came from a loading-phase lookup
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, QuotaError::Fetch(_))
    }

    /// Check if this is a user-facing error (vs internal)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            QuotaError::InvalidInput(_)
                | QuotaError::FileError(_)
                | QuotaError::ParseError(_)
                | QuotaError::UnknownObject(_)
                | QuotaError::UnknownParameter { .. }
                | QuotaError::UnknownLabel(_)
                | QuotaError::UnitsNotSelectable(_)
        )
    }
}

impl From<std::io::Error> for QuotaError {
    fn from(err: std::io::Error) -> Self {
        QuotaError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for QuotaError {
    fn from(err: serde_json::Error) -> Self {
        QuotaError::ParseError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for QuotaError {
    fn from(err: serde_yaml::Error) -> Self {
        QuotaError::SerializationError(format!("YAML error: {}", err))
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, QuotaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_message_is_verbatim() {
        let err = QuotaError::fetch("Invalid user token");
        assert_eq!(err.to_string(), "Invalid user token");
        assert!(err.is_fetch_failure());
    }

    #[test]
    fn test_error_display() {
        let err = QuotaError::unknown_parameter("compute", "gpu");
        assert_eq!(
            err.to_string(),
            "Unknown parameter 'gpu' in resource object 'compute'"
        );
    }

    #[test]
    fn test_is_user_error() {
        assert!(QuotaError::invalid_input("bad").is_user_error());
        assert!(QuotaError::UnknownLabel("team".to_string()).is_user_error());
        assert!(!QuotaError::fetch("down").is_user_error());
        assert!(!QuotaError::InternalError("test".to_string()).is_user_error());
    }
}
