use crate::config::ValidationError;
use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single call to the issue tracker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend responded with {0}")]
    Status(StatusCode),

    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend request failed: {0}")]
    Transport(String),

    #[error("could not decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// The status code the backend answered with, if it answered at all.
    pub fn backend_status(&self) -> Option<StatusCode> {
        match self {
            BackendError::Status(status) => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.backend_status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Server-class failures: 5xx responses, timeouts and transport faults.
    pub fn is_server_error(&self) -> bool {
        match self {
            BackendError::Status(status) => status.is_server_error(),
            BackendError::Timeout(_) | BackendError::Transport(_) | BackendError::Decode(_) => {
                true
            }
        }
    }

    /// Whether this failure on one identifier fails the whole card request.
    ///
    /// A rejected credential is shared by every call of the request, so 401
    /// aborts like a server error does. Any other client-class status only
    /// concerns the identifier it was returned for.
    pub fn aborts_aggregation(&self) -> bool {
        self.is_unauthorized() || self.is_server_error()
    }
}

/// Errors surfaced by the connector to its caller
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("missing connector authorization")]
    MissingConnectorCredential,

    #[error("invalid connector authorization")]
    InvalidConnectorCredential,

    #[error("Missing request header '{0}'")]
    MissingRequestHeader(&'static str),

    #[error("Invalid request header '{0}': {1}")]
    InvalidRequestHeader(&'static str, String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("No route matched for request")]
    NoRouteMatched,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
