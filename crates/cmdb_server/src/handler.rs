//! Request handlers for the CMDB endpoints.

use crate::auth::{BasicAuthValidator, Credentials};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::CmdbStore;
use cmdb_protocol::{
    ClassMetaResponse, Endpoint, HttpMethod, IdentifyReconcileRequest, IdentifyReconcileResponse,
    TableQuery, TableResponse, DATA_SOURCE_PARAM, QUERY_PARAM,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// An HTTP request, with its path relative to the API root.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method.
    pub method: HttpMethod,
    /// Path below the API root, e.g. `/table/server`.
    pub path: String,
    /// Decoded query parameters.
    pub query: Vec<(String, String)>,
    /// Basic auth credentials, if sent.
    pub credentials: Option<Credentials>,
    /// Request body.
    pub body: Vec<u8>,
}

impl Request {
    /// Creates a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            credentials: None,
            body: Vec::new(),
        }
    }

    /// Creates a POST request.
    pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            credentials: None,
            body,
        }
    }

    /// Adds a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Attaches basic auth credentials.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Returns the first value of query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// JSON body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a 200 response.
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// Creates the response for `err`.
    pub fn error(err: &ServerError) -> Self {
        Self {
            status: err.status_code(),
            body: err.to_response().encode().unwrap_or_default(),
        }
    }
}

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Class and record storage (shared across all handlers).
    pub store: Arc<CmdbStore>,
    /// Credential validator, when auth is enabled.
    validator: Option<BasicAuthValidator>,
    /// Failures injected per endpoint.
    failures: RwLock<Vec<(Endpoint, u16)>>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<CmdbStore>) -> Self {
        let validator = config.auth.clone().map(BasicAuthValidator::new);
        Self {
            config,
            store,
            validator,
            failures: RwLock::new(Vec::new()),
        }
    }

    /// Makes every request to `endpoint` fail with `status`.
    pub fn inject_failure(&self, endpoint: Endpoint, status: u16) {
        let mut failures = self.failures.write();
        failures.retain(|(e, _)| *e != endpoint);
        failures.push((endpoint, status));
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    fn injected_failure(&self, endpoint: &Endpoint) -> Option<u16> {
        self.failures
            .read()
            .iter()
            .find(|(e, _)| e == endpoint)
            .map(|(_, status)| *status)
    }
}

/// Handler for CMDB requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Authenticates, routes and handles a request.
    pub fn handle(&self, request: &Request) -> ServerResult<Vec<u8>> {
        if let Some(validator) = &self.context.validator {
            validator.validate(request.credentials.as_ref())?;
        }

        let endpoint = Endpoint::parse(request.method, &request.path)?;
        if let Some(status) = self.context.injected_failure(&endpoint) {
            return Err(ServerError::Injected { status });
        }
        debug!(method = %request.method, path = %request.path, "handling request");

        match endpoint {
            Endpoint::TableQuery { table } => {
                let query = TableQuery {
                    table,
                    query: request.query_param(QUERY_PARAM).unwrap_or_default().to_string(),
                };
                self.handle_table_query(&query)?.encode().map_err(internal)
            }
            Endpoint::ClassMeta { class_name } => {
                self.handle_class_meta(&class_name)?.encode().map_err(internal)
            }
            Endpoint::IdentifyReconcile => {
                let mut body = IdentifyReconcileRequest::decode(&request.body)?;
                body.data_source = request
                    .query_param(DATA_SOURCE_PARAM)
                    .unwrap_or_default()
                    .to_string();
                self.handle_identify_reconcile(&body)?
                    .encode()
                    .map_err(internal)
            }
        }
    }

    /// Handles a table query.
    pub fn handle_table_query(&self, query: &TableQuery) -> ServerResult<TableResponse> {
        let terms = query.terms();
        let terms: Vec<(&str, &str)> = terms
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .collect();
        let records =
            self.context
                .store
                .query(&query.table, &terms, self.context.config.max_results)?;
        Ok(TableResponse::new(records))
    }

    /// Handles a class metadata request.
    pub fn handle_class_meta(&self, class_name: &str) -> ServerResult<ClassMetaResponse> {
        let attributes = self.context.store.attributes(class_name)?;
        Ok(ClassMetaResponse::new(class_name, attributes))
    }

    /// Handles an identify-and-reconcile request.
    pub fn handle_identify_reconcile(
        &self,
        request: &IdentifyReconcileRequest,
    ) -> ServerResult<IdentifyReconcileResponse> {
        if request.items.is_empty() {
            return Err(ServerError::InvalidRequest("no items to reconcile".into()));
        }
        let items = request
            .items
            .iter()
            .map(|item| self.context.store.identify_reconcile(item))
            .collect();
        Ok(IdentifyReconcileResponse::new(items))
    }
}

fn internal(err: cmdb_protocol::ProtocolError) -> ServerError {
    ServerError::Internal(err.to_string())
}
