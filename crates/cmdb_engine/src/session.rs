//! Remote sessions and the factories that build them.
//!
//! A [`Session`] bundles the three capability-scoped clients used by one
//! reconciliation cycle. Factories only assemble clients; they never touch
//! the network.

use crate::config::{ConnectionConfig, EngineOptions};
use crate::credentials::{CredentialResolver, ProviderConfigRef};
use crate::engine::ReconciliationEngine;
use crate::error::CmdbResult;
use crate::http::{HttpClient, HttpTransport};
use crate::reqwest_client::ReqwestClient;
use crate::transport::{ItemQueryClient, ItemWriteClient, SchemaClient};
use std::sync::Arc;
use tracing::debug;

/// The clients available to one reconciliation cycle.
#[derive(Clone)]
pub struct Session {
    query: Arc<dyn ItemQueryClient>,
    schema: Arc<dyn SchemaClient>,
    write: Arc<dyn ItemWriteClient>,
}

impl Session {
    /// Creates a session from separate clients.
    pub fn new(
        query: Arc<dyn ItemQueryClient>,
        schema: Arc<dyn SchemaClient>,
        write: Arc<dyn ItemWriteClient>,
    ) -> Self {
        Self {
            query,
            schema,
            write,
        }
    }

    /// Creates a session where one transport serves every capability.
    pub fn from_transport<T>(transport: Arc<T>) -> Self
    where
        T: ItemQueryClient + SchemaClient + ItemWriteClient + 'static,
    {
        Self {
            query: transport.clone(),
            schema: transport.clone(),
            write: transport,
        }
    }

    /// Record lookup client.
    pub fn query(&self) -> &dyn ItemQueryClient {
        self.query.as_ref()
    }

    /// Schema client.
    pub fn schema(&self) -> &dyn SchemaClient {
        self.schema.as_ref()
    }

    /// Write client.
    pub fn write(&self) -> &dyn ItemWriteClient {
        self.write.as_ref()
    }
}

/// Builds sessions from resolved connection settings.
pub trait SessionFactory: Send + Sync {
    /// Builds a new session. Fails only when `config` is invalid.
    fn new_session(&self, config: &ConnectionConfig) -> CmdbResult<Session>;
}

/// Builds one [`HttpTransport`] per session over a cloned HTTP client.
#[derive(Clone)]
pub struct HttpSessionFactory<C: HttpClient + Clone> {
    client: C,
}

impl<C: HttpClient + Clone> HttpSessionFactory<C> {
    /// Creates a factory that hands clones of `client` to each transport.
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: HttpClient + Clone + 'static> SessionFactory for HttpSessionFactory<C> {
    fn new_session(&self, config: &ConnectionConfig) -> CmdbResult<Session> {
        config.validate()?;
        let transport = HttpTransport::new(config, self.client.clone());
        debug!(url = %transport.api_url(), "created CMDB session");
        Ok(Session::from_transport(Arc::new(transport)))
    }
}

/// Builds sessions over the blocking reqwest client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestSessionFactory;

impl ReqwestSessionFactory {
    /// Creates the factory.
    pub fn new() -> Self {
        Self
    }
}

impl SessionFactory for ReqwestSessionFactory {
    fn new_session(&self, config: &ConnectionConfig) -> CmdbResult<Session> {
        config.validate()?;
        let client = ReqwestClient::new(config)?;
        let transport = HttpTransport::new(config, client);
        debug!(url = %transport.api_url(), "created CMDB session");
        Ok(Session::from_transport(Arc::new(transport)))
    }
}

/// Hands out the same clients for every session.
#[derive(Clone)]
pub struct StaticSessionFactory {
    session: Session,
}

impl StaticSessionFactory {
    /// Creates a factory returning clones of `session`.
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl SessionFactory for StaticSessionFactory {
    fn new_session(&self, config: &ConnectionConfig) -> CmdbResult<Session> {
        config.validate()?;
        Ok(self.session.clone())
    }
}

/// Resolves credentials and opens an engine for a provider config.
pub struct Connector<R: CredentialResolver, F: SessionFactory> {
    resolver: R,
    factory: F,
    options: EngineOptions,
}

impl<R: CredentialResolver, F: SessionFactory> Connector<R, F> {
    /// Creates a connector with default engine options.
    pub fn new(resolver: R, factory: F) -> Self {
        Self {
            resolver,
            factory,
            options: EngineOptions::default(),
        }
    }

    /// Sets the options passed to every engine.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the credential resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Builds an engine for `provider`.
    pub fn connect(&self, provider: &ProviderConfigRef) -> CmdbResult<ReconciliationEngine> {
        let config = self.resolver.resolve(provider)?;
        config.validate()?;
        let session = self.factory.new_session(&config)?;
        debug!(provider = %provider.name, "connected to CMDB");
        Ok(ReconciliationEngine::new(session, self.options.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{
        CredentialsSource, MemorySecretStore, ProviderConfig, ProviderConfigResolver,
        ProviderCredentials, SecretKeySelector,
    };
    use crate::error::CmdbError;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::transport::MockCmdb;
    use cmdb_protocol::TableQuery;

    #[derive(Clone)]
    struct RefusingClient;

    impl HttpClient for RefusingClient {
        fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, String> {
            Err("connection refused".into())
        }
    }

    #[test]
    fn http_factory_builds_without_network() {
        let factory = HttpSessionFactory::new(RefusingClient);
        let config = ConnectionConfig::new("https://dev.example.com", "admin", "pw");
        let session = factory.new_session(&config).unwrap();

        // The first remote call is the one that fails.
        let err = session
            .query()
            .query_items(&TableQuery::by_name("server", "web01"))
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn factories_reject_invalid_config() {
        let config = ConnectionConfig::new("", "admin", "pw");
        assert!(matches!(
            HttpSessionFactory::new(RefusingClient).new_session(&config),
            Err(CmdbError::InvalidConfig(_))
        ));
        assert!(matches!(
            ReqwestSessionFactory::new().new_session(&config),
            Err(CmdbError::InvalidConfig(_))
        ));
        let session = Session::from_transport(Arc::new(MockCmdb::new()));
        assert!(StaticSessionFactory::new(session)
            .new_session(&config)
            .is_err());
    }

    #[test]
    fn reqwest_factory_builds_session() {
        let config = ConnectionConfig::new("https://dev.example.com", "admin", "pw");
        assert!(ReqwestSessionFactory::new().new_session(&config).is_ok());
    }

    #[test]
    fn static_factory_shares_clients() {
        let mock = Arc::new(MockCmdb::new());
        let factory = StaticSessionFactory::new(Session::from_transport(mock.clone()));
        let config = ConnectionConfig::new("https://dev.example.com", "admin", "pw");

        for _ in 0..2 {
            let session = factory.new_session(&config).unwrap();
            session
                .query()
                .query_items(&TableQuery::by_name("server", "web01"))
                .unwrap();
        }
        assert_eq!(mock.query_calls(), 2);
    }

    fn resolver() -> ProviderConfigResolver<MemorySecretStore> {
        let secrets = MemorySecretStore::new();
        secrets.insert("crossplane-system", "cmdb-creds", "password", "pw");
        ProviderConfigResolver::new(secrets).with_config(ProviderConfig {
            name: "default".into(),
            base_url: "https://dev.example.com".into(),
            username: "admin".into(),
            credentials: ProviderCredentials {
                source: CredentialsSource::Secret,
                secret_ref: Some(SecretKeySelector {
                    namespace: "crossplane-system".into(),
                    name: "cmdb-creds".into(),
                    key: "password".into(),
                }),
                env: None,
            },
        })
    }

    #[test]
    fn connector_resolves_and_connects() {
        let mock = Arc::new(MockCmdb::new());
        let connector = Connector::new(
            resolver(),
            StaticSessionFactory::new(Session::from_transport(mock)),
        );
        assert!(connector.connect(&ProviderConfigRef::new("default")).is_ok());
    }

    #[test]
    fn connector_surfaces_resolution_errors() {
        let mock = Arc::new(MockCmdb::new());
        let connector = Connector::new(
            resolver(),
            StaticSessionFactory::new(Session::from_transport(mock)),
        );
        let err = connector
            .connect(&ProviderConfigRef::new("missing"))
            .err()
            .unwrap();
        assert!(err.is_configuration_error());
        assert_eq!(
            err.to_string(),
            "cannot get referenced provider config missing"
        );
    }
}
