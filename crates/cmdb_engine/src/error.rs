//! Error types for the reconciliation engine.

use cmdb_protocol::ProtocolError;
use std::fmt;
use thiserror::Error;

/// Result type for engine operations.
pub type CmdbResult<T> = Result<T, CmdbError>;

/// The write call an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    /// Initial creation.
    Create,
    /// Convergence of a drifted record.
    Update,
    /// Retirement on deletion.
    Delete,
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteOperation::Create => "create",
            WriteOperation::Update => "update",
            WriteOperation::Delete => "retire",
        })
    }
}

/// Errors that can occur while reconciling a configuration item.
#[derive(Error, Debug)]
pub enum CmdbError {
    /// The managed record does not reference a provider config.
    #[error("no provider config referenced")]
    NoProviderConfig,

    /// The referenced provider config does not exist.
    #[error("cannot get referenced provider config {0}")]
    ProviderConfigNotFound(String),

    /// Secret-sourced credentials without a secret reference.
    #[error("no credentials secret referenced")]
    NoCredentialsSecret,

    /// The referenced secret or key could not be read.
    #[error("cannot get credentials secret {namespace}/{name}")]
    CredentialsSecretNotFound {
        /// Secret namespace.
        namespace: String,
        /// Secret name.
        name: String,
    },

    /// Environment-sourced credentials could not be read.
    #[error("cannot get credentials from environment: {0}")]
    EnvironmentCredentials(String),

    /// The credentials source kind is not implemented.
    #[error("credentials source {0} is not currently supported")]
    UnsupportedCredentialsSource(String),

    /// The connection configuration is structurally invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote API answered with a non-success status.
    #[error("remote error ({status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Message from the error body, or the raw body.
        message: String,
    },

    /// Malformed request or response body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The class schema could not be fetched.
    #[error("cannot get schema for class {class_name}: {source}")]
    SchemaUnavailable {
        /// Class whose schema was requested.
        class_name: String,
        /// Underlying failure.
        #[source]
        source: Box<CmdbError>,
    },

    /// A desired field is not an attribute of the class.
    #[error("{}", unknown_field_message(.field, .class_name, .similar))]
    UnknownField {
        /// The offending field name.
        field: String,
        /// Class the field was validated against.
        class_name: String,
        /// Schema attributes textually similar to `field`.
        similar: Vec<String>,
    },

    /// A create, update or retire write failed.
    #[error("cannot {operation} configuration item with identify-and-reconcile: {source}")]
    WriteFailed {
        /// Which write failed.
        operation: WriteOperation,
        /// Underlying failure.
        #[source]
        source: Box<CmdbError>,
    },

    /// Identify-and-reconcile returned no items.
    #[error("identify-and-reconcile returned no items")]
    EmptyReconcileResult,

    /// Identify-and-reconcile rejected the submitted item.
    #[error("identify-and-reconcile rejected item: {0}")]
    ReconcileRejected(String),

    /// The desired record is structurally invalid.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// An operation that needs a bound remote identity found none.
    #[error("no remote identity bound to record")]
    IdentityNotBound,
}

fn unknown_field_message(field: &str, class_name: &str, similar: &[String]) -> String {
    let hint = if similar.is_empty() {
        "none".to_string()
    } else {
        similar.join(", ")
    };
    format!(
        "the field {field} is not recognized for class {class_name}; \
         available fields similar to {field}: {hint}"
    )
}

impl CmdbError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Wraps a failure as a write error of the given kind.
    pub fn write_failed(operation: WriteOperation, source: CmdbError) -> Self {
        Self::WriteFailed {
            operation,
            source: Box::new(source),
        }
    }

    /// Wraps a failure as an unavailable schema.
    pub fn schema_unavailable(class_name: impl Into<String>, source: CmdbError) -> Self {
        Self::SchemaUnavailable {
            class_name: class_name.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            CmdbError::Transport { retryable, .. } => *retryable,
            CmdbError::Remote { status, .. } => *status >= 500 || *status == 429,
            CmdbError::SchemaUnavailable { source, .. } | CmdbError::WriteFailed { source, .. } => {
                source.is_retryable()
            }
            _ => false,
        }
    }

    /// Returns true if this is a configuration error (never retried by the engine).
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CmdbError::NoProviderConfig
                | CmdbError::ProviderConfigNotFound(_)
                | CmdbError::NoCredentialsSecret
                | CmdbError::CredentialsSecretNotFound { .. }
                | CmdbError::EnvironmentCredentials(_)
                | CmdbError::UnsupportedCredentialsSource(_)
                | CmdbError::InvalidConfig(_)
        )
    }
}

impl From<ProtocolError> for CmdbError {
    fn from(err: ProtocolError) -> Self {
        CmdbError::Protocol(err.to_string())
    }
}
