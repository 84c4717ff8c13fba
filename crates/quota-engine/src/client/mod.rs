//! Remote access to the quota manager backend

mod http;

pub use http::HttpSchemeSource;

use crate::error::QuotaError;

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// `message` is the backend's own message when it sent one
    #[error("{message}")]
    Server { status: u16, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ClientError> for QuotaError {
    fn from(err: ClientError) -> Self {
        QuotaError::Fetch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_is_verbatim() {
        let err: QuotaError = ClientError::Server {
            status: 403,
            message: "project is locked".to_string(),
        }
        .into();
        assert!(err.is_fetch_failure());
        assert_eq!(err.to_string(), "project is locked");
    }

    #[test]
    fn test_status() {
        assert_eq!(ClientError::Network("down".into()).status(), None);
        assert_eq!(
            ClientError::Server {
                status: 500,
                message: String::new()
            }
            .status(),
            Some(500)
        );
    }
}
