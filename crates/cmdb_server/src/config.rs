//! Server configuration.

use crate::auth::AuthConfig;

/// Configuration for the reference CMDB server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// API root the server answers under.
    pub api_path: String,
    /// Maximum records returned by one table query.
    pub max_results: usize,
    /// Basic auth credentials (if auth enabled).
    pub auth: Option<AuthConfig>,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new() -> Self {
        Self {
            api_path: "/api/now".to_string(),
            max_results: 100,
            auth: None,
        }
    }

    /// Sets the API root.
    pub fn with_api_path(mut self, api_path: impl Into<String>) -> Self {
        self.api_path = api_path.into();
        self
    }

    /// Sets the maximum records per table query.
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Requires basic auth with the given credentials.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(AuthConfig::new(username, password));
        self
    }

    /// Returns true if requests must authenticate.
    pub fn requires_auth(&self) -> bool {
        self.auth.is_some()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
