//! Error types
//!
//! Typed errors for the REST clients, notification parsing and the event
//! handler. None of these escape the handler: client wrappers turn them
//! into sentinels and the handler logs whatever is left.

use thiserror::Error;

/// Errors raised while talking to Firestore, Dataform or the metadata server
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request could not be sent or the response could not be read
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape
    #[error("Unexpected response from {url}: {details}")]
    InvalidResponse { url: String, details: String },

    /// No bearer token could be obtained
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl ClientError {
    /// HTTP status code, if the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this error means the resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Errors raised while validating an incoming change notification
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventError {
    /// A required attribute is absent or empty
    #[error("Notification is missing '{0}'")]
    MissingField(&'static str),

    /// The document path is not `<collection>/<doc-id>`
    #[error("Invalid document path '{0}': expected '<collection>/<document-id>'")]
    InvalidDocumentPath(String),

    /// The body is not a JSON notification
    #[error("Malformed notification body: {0}")]
    Malformed(String),
}

/// Errors that end an invocation early
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error("Failed to serialize document data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_not_found() {
        let err = ClientError::Status {
            url: "https://firestore.googleapis.com/v1/x".to_string(),
            status: 404,
            body: String::new(),
        };

        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_auth_error_has_no_status() {
        let err = ClientError::Auth("metadata server unreachable".to_string());
        assert!(err.status().is_none());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::Status {
            url: "https://dataform.googleapis.com/v1beta1/w:writeFile".to_string(),
            status: 403,
            body: "permission denied".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn test_event_error_display() {
        let err = EventError::InvalidDocumentPath("users".to_string());
        assert!(err.to_string().contains("<collection>/<document-id>"));
    }
}
