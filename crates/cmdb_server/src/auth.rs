//! Basic authentication for the reference server.
//!
//! Every request may carry a user name and password. When the server is
//! configured with credentials, requests without matching ones are
//! rejected with 401.

use crate::error::{ServerError, ServerResult};
use std::fmt;

/// Credentials presented with a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected user name.
    pub username: String,
    /// Expected password.
    pub password: String,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Credential validator for incoming requests.
#[derive(Debug, Clone)]
pub struct BasicAuthValidator {
    config: AuthConfig,
}

impl BasicAuthValidator {
    /// Creates a new validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Validates the credentials presented with a request.
    pub fn validate(&self, presented: Option<&Credentials>) -> ServerResult<()> {
        let presented = presented.ok_or_else(|| {
            ServerError::AuthenticationFailed("Required to provide Auth information".into())
        })?;

        // Compare both fields even when the first differs
        let user_ok = constant_time_eq(
            presented.username.as_bytes(),
            self.config.username.as_bytes(),
        );
        let pass_ok = constant_time_eq(
            presented.password.as_bytes(),
            self.config.password.as_bytes(),
        );
        if user_ok & pass_ok {
            Ok(())
        } else {
            Err(ServerError::AuthenticationFailed(
                "invalid user name or password".into(),
            ))
        }
    }
}

/// Compares two byte strings in time independent of where they differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
