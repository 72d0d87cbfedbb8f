//! Error types for protocol encoding and decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding, decoding or routing protocol messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON encoding failed.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// Message being encoded.
        what: &'static str,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// JSON decoding failed.
    #[error("failed to decode {what}: {source}")]
    Decode {
        /// Message being decoded.
        what: &'static str,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// The request path does not match any known endpoint.
    #[error("unknown endpoint: {method} {path}")]
    UnknownEndpoint {
        /// HTTP method.
        method: String,
        /// Request path relative to the API root.
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_endpoint_display() {
        let err = ProtocolError::UnknownEndpoint {
            method: "DELETE".into(),
            path: "/table/x".into(),
        };
        assert_eq!(err.to_string(), "unknown endpoint: DELETE /table/x");
    }
}
