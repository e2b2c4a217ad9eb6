//! Provider error handling
//!
//! Typed errors for calls to the list provider, with enough context to show
//! a short status line and to decide whether a call is worth retrying.

use thiserror::Error;

/// Errors that can occur while talking to the list provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Credentials were not supplied
    #[error("Missing provider credentials: set {0} in the environment")]
    MissingCredentials(&'static str),

    /// Transport-level failure (DNS, connect, timeout, TLS)
    #[error("Request to provider failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Provider answered with a body we could not decode
    #[error("Unexpected provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// HTTP status code, if the provider answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            ProviderError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the subscriber targeted by the call was not on the list
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the request was rejected because of the credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = ProviderError::Status {
            status: 404,
            body: "not in list".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());

        let err = ProviderError::Status {
            status: 401,
            body: String::new(),
        };
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::MissingCredentials("CM_API_KEY");
        assert!(err.to_string().contains("CM_API_KEY"));

        let err = ProviderError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_decode_has_no_status() {
        let err = ProviderError::Decode("bad json".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_not_found());
    }
}
