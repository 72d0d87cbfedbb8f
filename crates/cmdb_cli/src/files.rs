//! JSON input files: provider configs, secrets and managed records.

use cmdb_engine::{ManagedRecord, MemorySecretStore, ProviderConfig, ProviderConfigRef, SecretEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing CLI files.
#[derive(Error, Debug)]
pub enum FileError {
    /// The file could not be read or written.
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON of the expected shape.
    #[error("cannot parse {}: {source}", .path.display())]
    Json {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// A managed record file: the record plus the provider config it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFile {
    /// Provider config used to reach the CMDB.
    #[serde(rename = "providerConfigRef", default)]
    pub provider_config_ref: ProviderConfigRef,
    /// Desired state and bound identity.
    #[serde(flatten)]
    pub record: ManagedRecord,
}

impl RecordFile {
    /// Loads a record file.
    pub fn load(path: &Path) -> Result<Self, FileError> {
        read_json(path)
    }

    /// Writes the record file back, pretty-printed.
    pub fn save(&self, path: &Path) -> Result<(), FileError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| FileError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loads a provider config file (a JSON array of provider configs).
pub fn load_providers(path: &Path) -> Result<Vec<ProviderConfig>, FileError> {
    read_json(path)
}

/// Loads a secrets file (a JSON array of secrets) into a store.
pub fn load_secrets(path: &Path) -> Result<MemorySecretStore, FileError> {
    let entries: Vec<SecretEntry> = read_json(path)?;
    Ok(MemorySecretStore::from_entries(entries))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, FileError> {
    let bytes = fs::read(path).map_err(|source| FileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| FileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdb_engine::{CredentialsSource, RemoteIdentity, SecretStore};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const RECORD: &str = r#"{
        "providerConfigRef": {"name": "default"},
        "forProvider": {
            "sysParamDataSource": "ServiceNow",
            "className": "cmdb_ci_server",
            "name": "web01",
            "values": {"ip_address": "10.0.0.1"}
        }
    }"#;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn record_file_round_trip() {
        let file = write_temp(RECORD);
        let mut loaded = RecordFile::load(file.path()).unwrap();
        assert_eq!(loaded.provider_config_ref.name, "default");
        assert_eq!(loaded.record.desired.class_name, "cmdb_ci_server");
        assert!(!loaded.record.is_bound());

        loaded.record = ManagedRecord::with_identity(
            loaded.record.desired.clone(),
            RemoteIdentity::new("abc123"),
        );
        let dir = tempdir().unwrap();
        let out = dir.path().join("record.json");
        loaded.save(&out).unwrap();

        let reloaded = RecordFile::load(&out).unwrap();
        assert_eq!(reloaded, loaded);
        let raw = fs::read_to_string(&out).unwrap();
        assert!(raw.contains("\"externalName\": \"abc123\""));
    }

    #[test]
    fn providers_and_secrets() {
        let providers = write_temp(
            r#"[{
                "name": "default",
                "baseURL": "https://dev.example.com",
                "username": "admin",
                "credentials": {
                    "source": "Secret",
                    "secretRef": {"namespace": "ns", "name": "creds", "key": "password"}
                }
            }]"#,
        );
        let loaded = load_providers(providers.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].credentials.source, CredentialsSource::Secret);

        let secrets = write_temp(
            r#"[{"namespace": "ns", "name": "creds", "data": {"password": "pw"}}]"#,
        );
        let store = load_secrets(secrets.path()).unwrap();
        let data = store.get("ns", "creds").unwrap();
        assert_eq!(data["password"], b"pw".to_vec());
    }

    #[test]
    fn missing_file_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = RecordFile::load(&path).unwrap_err();
        assert!(matches!(err, FileError::Io { .. }));
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn malformed_file() {
        let file = write_temp("{\"forProvider\": 3}");
        let err = RecordFile::load(file.path()).unwrap_err();
        assert!(matches!(err, FileError::Json { .. }));
    }
}
