//! Credential resolution from provider configs and secret stores.
//!
//! A managed record references a provider config by name. The provider
//! config names the instance URL, the user, and where the password lives.
//! Resolution turns that reference into a [`ConnectionConfig`].

use crate::config::ConnectionConfig;
use crate::error::{CmdbError, CmdbResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reference from a managed record to a provider config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfigRef {
    /// Provider config name.
    pub name: String,
}

impl ProviderConfigRef {
    /// Creates a reference by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Where the password of a provider config comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CredentialsSource {
    /// No credentials.
    #[default]
    None,
    /// A key of a stored secret.
    Secret,
    /// An environment variable.
    Environment,
    /// A file on disk.
    Filesystem,
    /// An identity injected by the runtime.
    InjectedIdentity,
}

impl fmt::Display for CredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialsSource::None => "None",
            CredentialsSource::Secret => "Secret",
            CredentialsSource::Environment => "Environment",
            CredentialsSource::Filesystem => "Filesystem",
            CredentialsSource::InjectedIdentity => "InjectedIdentity",
        })
    }
}

/// Selects one key of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    /// Secret namespace.
    pub namespace: String,
    /// Secret name.
    pub name: String,
    /// Key within the secret data.
    pub key: String,
}

/// Selects an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSelector {
    /// Variable name.
    pub name: String,
}

/// Credentials section of a provider config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    /// Credentials source.
    pub source: CredentialsSource,
    /// Secret key holding the password (for `Secret`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
    /// Environment variable holding the password (for `Environment`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvSelector>,
}

/// Connection settings for one CMDB instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Provider config name.
    pub name: String,
    /// Instance base URL.
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Basic auth user name.
    pub username: String,
    /// Password source.
    pub credentials: ProviderCredentials,
}

/// Read access to stored secrets.
pub trait SecretStore: Send + Sync {
    /// Returns the data of secret `namespace/name`, if it exists.
    fn get(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, Vec<u8>>>;
}

/// A secret as written in a secrets file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretEntry {
    /// Secret namespace.
    pub namespace: String,
    /// Secret name.
    pub name: String,
    /// Key/value data.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// An in-memory secret store.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<BTreeMap<(String, String), BTreeMap<String, Vec<u8>>>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from secrets-file entries.
    pub fn from_entries(entries: impl IntoIterator<Item = SecretEntry>) -> Self {
        let store = Self::new();
        for entry in entries {
            for (key, value) in entry.data {
                store.insert(&entry.namespace, &entry.name, &key, value.into_bytes());
            }
        }
        store
    }

    /// Inserts or replaces one key of a secret.
    pub fn insert(&self, namespace: &str, name: &str, key: &str, value: impl Into<Vec<u8>>) {
        self.secrets
            .write()
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.into());
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, Vec<u8>>> {
        self.secrets
            .read()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

/// Resolves a provider config reference into connection settings.
pub trait CredentialResolver: Send + Sync {
    /// Resolves `reference` into a connection configuration.
    fn resolve(&self, reference: &ProviderConfigRef) -> CmdbResult<ConnectionConfig>;
}

/// Resolver over a set of provider configs and a secret store.
pub struct ProviderConfigResolver<S: SecretStore> {
    configs: BTreeMap<String, ProviderConfig>,
    secrets: S,
}

impl<S: SecretStore> ProviderConfigResolver<S> {
    /// Creates a resolver with no provider configs.
    pub fn new(secrets: S) -> Self {
        Self {
            configs: BTreeMap::new(),
            secrets,
        }
    }

    /// Adds a provider config, replacing any with the same name.
    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.insert(config);
        self
    }

    /// Adds a provider config, replacing any with the same name.
    pub fn insert(&mut self, config: ProviderConfig) {
        self.configs.insert(config.name.clone(), config);
    }

    /// Returns the secret store.
    pub fn secrets(&self) -> &S {
        &self.secrets
    }

    fn secret_password(&self, selector: &SecretKeySelector) -> CmdbResult<String> {
        let not_found = || CmdbError::CredentialsSecretNotFound {
            namespace: selector.namespace.clone(),
            name: selector.name.clone(),
        };

        let data = self
            .secrets
            .get(&selector.namespace, &selector.name)
            .ok_or_else(not_found)?;
        let raw = data.get(&selector.key).ok_or_else(not_found)?;

        String::from_utf8(raw.clone()).map_err(|_| {
            CmdbError::InvalidConfig(format!(
                "credentials secret {}/{} key {} is not valid UTF-8",
                selector.namespace, selector.name, selector.key
            ))
        })
    }
}

impl<S: SecretStore> CredentialResolver for ProviderConfigResolver<S> {
    fn resolve(&self, reference: &ProviderConfigRef) -> CmdbResult<ConnectionConfig> {
        if reference.name.is_empty() {
            return Err(CmdbError::NoProviderConfig);
        }

        let config = self
            .configs
            .get(&reference.name)
            .ok_or_else(|| CmdbError::ProviderConfigNotFound(reference.name.clone()))?;

        let credentials = &config.credentials;
        let password = match credentials.source {
            CredentialsSource::Secret => {
                let selector = credentials
                    .secret_ref
                    .as_ref()
                    .ok_or(CmdbError::NoCredentialsSecret)?;
                self.secret_password(selector)?
            }
            CredentialsSource::Environment => {
                let env = credentials.env.as_ref().ok_or_else(|| {
                    CmdbError::EnvironmentCredentials("no environment variable referenced".into())
                })?;
                std::env::var(&env.name)
                    .map_err(|e| CmdbError::EnvironmentCredentials(format!("{}: {e}", env.name)))?
            }
            other => return Err(CmdbError::UnsupportedCredentialsSource(other.to_string())),
        };

        Ok(ConnectionConfig::new(
            config.base_url.clone(),
            config.username.clone(),
            password,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_config(secret_ref: Option<SecretKeySelector>) -> ProviderConfig {
        ProviderConfig {
            name: "default".into(),
            base_url: "https://dev.example.com".into(),
            username: "admin".into(),
            credentials: ProviderCredentials {
                source: CredentialsSource::Secret,
                secret_ref,
                env: None,
            },
        }
    }

    fn selector() -> SecretKeySelector {
        SecretKeySelector {
            namespace: "crossplane-system".into(),
            name: "cmdb-creds".into(),
            key: "password".into(),
        }
    }

    #[test]
    fn resolves_secret_credentials() {
        let store = MemorySecretStore::new();
        store.insert("crossplane-system", "cmdb-creds", "password", "s3cret");
        let resolver =
            ProviderConfigResolver::new(store).with_config(secret_config(Some(selector())));

        let config = resolver.resolve(&ProviderConfigRef::new("default")).unwrap();
        assert_eq!(config.base_url, "https://dev.example.com");
        assert_eq!(config.username, "admin");
        assert_eq!(config.password.as_str(), "s3cret");
    }

    #[test]
    fn empty_reference_is_rejected() {
        let resolver = ProviderConfigResolver::new(MemorySecretStore::new());
        let err = resolver.resolve(&ProviderConfigRef::default()).unwrap_err();
        assert!(matches!(err, CmdbError::NoProviderConfig));
    }

    #[test]
    fn unknown_provider_config() {
        let resolver = ProviderConfigResolver::new(MemorySecretStore::new());
        let err = resolver.resolve(&ProviderConfigRef::new("missing")).unwrap_err();
        assert_eq!(err.to_string(), "cannot get referenced provider config missing");
        assert!(err.is_configuration_error());
    }

    #[test]
    fn secret_source_without_reference() {
        let resolver =
            ProviderConfigResolver::new(MemorySecretStore::new()).with_config(secret_config(None));
        let err = resolver.resolve(&ProviderConfigRef::new("default")).unwrap_err();
        assert_eq!(err.to_string(), "no credentials secret referenced");
    }

    #[test]
    fn missing_secret_and_missing_key() {
        let resolver = ProviderConfigResolver::new(MemorySecretStore::new())
            .with_config(secret_config(Some(selector())));
        let err = resolver.resolve(&ProviderConfigRef::new("default")).unwrap_err();
        assert!(matches!(err, CmdbError::CredentialsSecretNotFound { .. }));

        let store = MemorySecretStore::new();
        store.insert("crossplane-system", "cmdb-creds", "token", "x");
        let resolver =
            ProviderConfigResolver::new(store).with_config(secret_config(Some(selector())));
        let err = resolver.resolve(&ProviderConfigRef::new("default")).unwrap_err();
        assert!(matches!(err, CmdbError::CredentialsSecretNotFound { .. }));
    }

    #[test]
    fn non_utf8_secret_is_invalid_config() {
        let store = MemorySecretStore::new();
        store.insert("crossplane-system", "cmdb-creds", "password", vec![0xff, 0xfe]);
        let resolver =
            ProviderConfigResolver::new(store).with_config(secret_config(Some(selector())));
        let err = resolver.resolve(&ProviderConfigRef::new("default")).unwrap_err();
        assert!(matches!(err, CmdbError::InvalidConfig(_)));
    }

    #[test]
    fn environment_source() {
        let var = "CMDB_ENGINE_TEST_PASSWORD_7F3A";
        std::env::set_var(var, "from-env");

        let mut config = secret_config(None);
        config.credentials = ProviderCredentials {
            source: CredentialsSource::Environment,
            secret_ref: None,
            env: Some(EnvSelector { name: var.into() }),
        };
        let resolver = ProviderConfigResolver::new(MemorySecretStore::new()).with_config(config);
        let resolved = resolver.resolve(&ProviderConfigRef::new("default")).unwrap();
        assert_eq!(resolved.password.as_str(), "from-env");
    }

    #[test]
    fn environment_source_unset_variable() {
        let mut config = secret_config(None);
        config.credentials = ProviderCredentials {
            source: CredentialsSource::Environment,
            secret_ref: None,
            env: Some(EnvSelector {
                name: "CMDB_ENGINE_TEST_UNSET_91B2".into(),
            }),
        };
        let resolver = ProviderConfigResolver::new(MemorySecretStore::new()).with_config(config);
        let err = resolver.resolve(&ProviderConfigRef::new("default")).unwrap_err();
        assert!(matches!(err, CmdbError::EnvironmentCredentials(_)));
    }

    #[test]
    fn unsupported_sources() {
        for source in [
            CredentialsSource::None,
            CredentialsSource::Filesystem,
            CredentialsSource::InjectedIdentity,
        ] {
            let mut config = secret_config(None);
            config.credentials.source = source;
            let resolver =
                ProviderConfigResolver::new(MemorySecretStore::new()).with_config(config);
            let err = resolver.resolve(&ProviderConfigRef::new("default")).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("credentials source {source} is not currently supported")
            );
        }
    }

    #[test]
    fn provider_config_json_shape() {
        let json = r#"{
            "name": "default",
            "baseURL": "https://dev.example.com",
            "username": "admin",
            "credentials": {
                "source": "Secret",
                "secretRef": {"namespace": "crossplane-system", "name": "cmdb-creds", "key": "password"}
            }
        }"#;
        let config: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, secret_config(Some(selector())));
    }

    #[test]
    fn secret_store_from_entries() {
        let store = MemorySecretStore::from_entries(vec![SecretEntry {
            namespace: "ns".into(),
            name: "creds".into(),
            data: BTreeMap::from([("password".to_string(), "pw".to_string())]),
        }]);
        let data = store.get("ns", "creds").unwrap();
        assert_eq!(data.get("password").map(Vec::as_slice), Some(&b"pw"[..]));
        assert!(store.get("ns", "other").is_none());
    }
}
