//! # CMDB Engine
//!
//! Desired-state reconciliation of configuration items against a remote CMDB.
//!
//! This crate provides:
//! - Credential resolution from provider configs and secret stores
//! - Session factories over HTTP (blocking reqwest or loopback)
//! - Schema validation of desired fields with similar-field hints
//! - Drift comparison with subset semantics
//! - The reconciliation engine (observe → create / update / delete)
//!
//! ## Architecture
//!
//! One reconciliation cycle for one record:
//! 1. Resolve credentials and open a session
//! 2. Observe: look the record up by name, validate its fields, compare
//! 3. Create if absent, update if drifted, nothing if synced
//!
//! ## Key Invariants
//!
//! - A record's remote identity is bound once, by Create, and never replaced
//! - Observe makes no remote call for a record that was never created
//! - Every desired field is checked against the class schema before a write
//! - Writes go through identify-and-reconcile, so repeating Create is safe

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod credentials;
mod drift;
mod engine;
mod error;
mod http;
mod record;
mod reqwest_client;
mod schema;
mod session;
mod transport;

pub use config::{
    ConnectionConfig, DeletionPolicy, EngineOptions, LookupFailurePolicy, DEFAULT_API_PATH,
};
pub use credentials::{
    CredentialResolver, CredentialsSource, EnvSelector, MemorySecretStore, ProviderConfig,
    ProviderConfigRef, ProviderConfigResolver, ProviderCredentials, SecretEntry, SecretKeySelector,
    SecretStore,
};
pub use drift::{diff_fields, is_up_to_date, FieldDrift};
pub use engine::{
    treat_lookup_failure_as_absent, Creation, CycleOutcome, Deletion, Observation,
    ReconciliationEngine, RecordState, UpdateOutcome,
};
pub use error::{CmdbError, CmdbResult, WriteOperation};
pub use http::{
    BasicAuth, HttpClient, HttpRequest, HttpResponse, HttpTransport, LoopbackClient,
    LoopbackServer,
};
pub use record::{DesiredRecord, ManagedRecord, RemoteIdentity, NAME_FIELD};
pub use reqwest_client::ReqwestClient;
pub use schema::{similar_attributes, ClassSchema, SchemaValidator};
pub use session::{
    Connector, HttpSessionFactory, ReqwestSessionFactory, Session, SessionFactory,
    StaticSessionFactory,
};
pub use transport::{ItemQueryClient, ItemWriteClient, MockCmdb, SchemaClient};
