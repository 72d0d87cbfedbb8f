//! CLI command implementations.

pub mod apply;
pub mod delete;
pub mod observe;

use crate::files::{load_providers, load_secrets, RecordFile};
use cmdb_engine::{
    Connector, EngineOptions, MemorySecretStore, ProviderConfigResolver, ReconciliationEngine,
    ReqwestSessionFactory,
};
use std::path::PathBuf;

/// Locations of the shared input files.
#[derive(Debug, Clone)]
pub struct Context {
    /// Provider config file.
    pub providers: PathBuf,
    /// Secrets file, if any.
    pub secrets: Option<PathBuf>,
}

impl Context {
    /// Opens an engine for the provider config referenced by `file`.
    pub fn connect(
        &self,
        file: &RecordFile,
        options: EngineOptions,
    ) -> Result<ReconciliationEngine, Box<dyn std::error::Error>> {
        let secrets = match &self.secrets {
            Some(path) => load_secrets(path)?,
            None => MemorySecretStore::new(),
        };
        let mut resolver = ProviderConfigResolver::new(secrets);
        for config in load_providers(&self.providers)? {
            resolver.insert(config);
        }

        let connector =
            Connector::new(resolver, ReqwestSessionFactory::new()).with_options(options);
        Ok(connector.connect(&file.provider_config_ref)?)
    }
}

/// Prints `value` as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
