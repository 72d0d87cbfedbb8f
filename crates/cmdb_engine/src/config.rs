//! Configuration for sessions and the reconciliation engine.

use crate::error::{CmdbError, CmdbResult};
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Default REST API root appended to the base URL.
pub const DEFAULT_API_PATH: &str = "/api/now";

/// Resolved connection settings for one remote CMDB.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Instance base URL (e.g. `https://example.service-now.com`).
    pub base_url: String,
    /// Basic auth user name.
    pub username: String,
    /// Basic auth password, wiped on drop.
    pub password: Zeroizing<String>,
    /// API root appended to the base URL.
    pub api_path: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl ConnectionConfig {
    /// Creates a new connection configuration.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: Zeroizing::new(password.into()),
            api_path: DEFAULT_API_PATH.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("cmdb-reconciler/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the API root.
    pub fn with_api_path(mut self, api_path: impl Into<String>) -> Self {
        self.api_path = api_path.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the base URL joined with the API root, without a trailing slash.
    pub fn api_url(&self) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        let path = self.api_path.trim_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    /// Checks that the configuration is structurally usable.
    pub fn validate(&self) -> CmdbResult<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(CmdbError::InvalidConfig("empty base URL".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(CmdbError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got {base}"
            )));
        }
        if self.username.trim().is_empty() {
            return Err(CmdbError::InvalidConfig("empty username".into()));
        }
        if self.timeout.is_zero() {
            return Err(CmdbError::InvalidConfig("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("api_path", &self.api_path)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// What Observe does when the remote lookup itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupFailurePolicy {
    /// Report the record as absent so the next step re-creates it.
    ///
    /// Relies on identify-and-reconcile being idempotent.
    #[default]
    TreatAsAbsent,
    /// Return the lookup error to the caller.
    Propagate,
}

/// What Delete does with the remote record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    /// Leave the remote record in place; it is retired out of band.
    #[default]
    Orphan,
    /// Write a retirement marker field through identify-and-reconcile.
    Retire {
        /// Field to set, e.g. `install_status`.
        field: String,
        /// Value marking the record retired, e.g. `7`.
        value: String,
    },
}

impl DeletionPolicy {
    /// Creates a retire policy.
    pub fn retire(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Retire {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Behavioural options for the reconciliation engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Lookup failure handling in Observe.
    pub lookup_failure: LookupFailurePolicy,
    /// Remote handling on Delete.
    pub deletion: DeletionPolicy,
    /// Whether Create validates desired fields against the class schema.
    pub validate_on_create: bool,
}

impl EngineOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self {
            lookup_failure: LookupFailurePolicy::TreatAsAbsent,
            deletion: DeletionPolicy::Orphan,
            validate_on_create: true,
        }
    }

    /// Sets the lookup failure policy.
    pub fn with_lookup_failure(mut self, policy: LookupFailurePolicy) -> Self {
        self.lookup_failure = policy;
        self
    }

    /// Sets the deletion policy.
    pub fn with_deletion(mut self, policy: DeletionPolicy) -> Self {
        self.deletion = policy;
        self
    }

    /// Enables or disables schema validation on Create.
    pub fn with_validate_on_create(mut self, validate: bool) -> Self {
        self.validate_on_create = validate;
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::new()
    }
}
