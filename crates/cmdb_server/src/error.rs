//! Error types for the reference server.

use cmdb_protocol::{ErrorResponse, ProtocolError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the reference server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No route for the method and path.
    #[error("no such endpoint: {0}")]
    NotFound(String),

    /// The requested class is not defined.
    #[error("invalid table {0}")]
    UnknownClass(String),

    /// A failure configured by a test.
    #[error("injected failure ({status})")]
    Injected {
        /// Status code to answer with.
        status: u16,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::UnknownClass(_) => 400,
            ServerError::AuthenticationFailed(_) => 401,
            ServerError::NotFound(_) => 404,
            ServerError::Injected { status } => *status,
            ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Builds the error body sent to the client.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            ServerError::AuthenticationFailed(_) => "User Not Authenticated",
            ServerError::UnknownClass(_) => "Invalid table",
            ServerError::NotFound(_) => "Requested URI does not represent any resource",
            _ => "Request failed",
        };
        ErrorResponse::new(message, Some(self.to_string()))
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownEndpoint { .. } => ServerError::NotFound(err.to_string()),
            other => ServerError::InvalidRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
        assert!(ServerError::Injected { status: 503 }.is_server_error());
        assert!(ServerError::Injected { status: 429 }.is_client_error());
    }

    #[test]
    fn status_codes() {
        assert_eq!(ServerError::AuthenticationFailed("x".into()).status_code(), 401);
        assert_eq!(ServerError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ServerError::UnknownClass("x".into()).status_code(), 400);
    }

    #[test]
    fn response_body() {
        let body = ServerError::UnknownClass("nope".into()).to_response();
        assert_eq!(body.describe(), "Invalid table: invalid table nope");
    }

    #[test]
    fn unknown_endpoint_maps_to_not_found() {
        let err: ServerError = ProtocolError::UnknownEndpoint {
            method: "GET".into(),
            path: "/nope".into(),
        }
        .into();
        assert_eq!(err.status_code(), 404);
    }
}
