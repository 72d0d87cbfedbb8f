//! Main reference server.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{HandlerContext, Request, RequestHandler, Response};
use crate::store::CmdbStore;
use cmdb_protocol::{Endpoint, RemoteRecord};
use std::sync::Arc;
use tracing::warn;

/// The reference CMDB server.
///
/// This server answers the table, class metadata and identify-and-reconcile
/// endpoints from an in-memory store. It has no network listener; callers
/// hand it already-parsed requests.
///
/// # Example
///
/// ```
/// use cmdb_server::{CmdbServer, Request, ServerConfig};
///
/// let server = CmdbServer::new(ServerConfig::default());
/// server.define_class("server", ["ip"]);
///
/// let response = server.handle(&Request::get("/cmdb/meta/server"));
/// assert_eq!(response.status, 200);
/// ```
pub struct CmdbServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl CmdbServer {
    /// Creates a new server with an empty store.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(CmdbStore::new()))
    }

    /// Creates a server over an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<CmdbStore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the backing store.
    pub fn store(&self) -> &CmdbStore {
        &self.context.store
    }

    /// Handles a request, mapping errors to error responses.
    pub fn handle(&self, request: &Request) -> Response {
        match self.handler.handle(request) {
            Ok(body) => Response::ok(body),
            Err(err) => {
                warn!(method = %request.method, path = %request.path, error = %err, "request failed");
                Response::error(&err)
            }
        }
    }

    /// Defines a class with the given attributes.
    pub fn define_class<I, S>(&self, class_name: &str, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context.store.define_class(class_name, attributes);
    }

    /// Seeds a record; returns its `sys_id`.
    pub fn insert_record(&self, class_name: &str, record: RemoteRecord) -> ServerResult<String> {
        self.context.store.insert_record(class_name, record)
    }

    /// Returns the number of records in `class_name`.
    pub fn record_count(&self, class_name: &str) -> usize {
        self.context.store.record_count(class_name)
    }

    /// Makes every request to `endpoint` answer with `status`.
    pub fn inject_failure(&self, endpoint: Endpoint, status: u16) {
        self.context.inject_failure(endpoint, status);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.context.clear_failures();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdb_protocol::{
        IdentifyReconcileRequest, IdentifyReconcileResponse, ReconcileOperation, TableResponse,
        DATA_SOURCE_PARAM, QUERY_PARAM,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn server() -> CmdbServer {
        let server = CmdbServer::new(ServerConfig::default());
        server.define_class("server", ["ip"]);
        server
    }

    fn reconcile(server: &CmdbServer, ip: &str) -> IdentifyReconcileResponse {
        let values = BTreeMap::from([
            ("name".to_string(), "web01".to_string()),
            ("ip".to_string(), ip.to_string()),
        ]);
        let body = IdentifyReconcileRequest::single("ServiceNow", "server", values)
            .encode()
            .unwrap();
        let request =
            Request::post("/identifyreconcile", body).with_query(DATA_SOURCE_PARAM, "ServiceNow");
        let response = server.handle(&request);
        assert_eq!(response.status, 200);
        IdentifyReconcileResponse::decode(&response.body).unwrap()
    }

    #[test]
    fn server_lifecycle() {
        let server = server();
        assert_eq!(server.record_count("server"), 0);
        assert_eq!(server.config().api_path, "/api/now");
    }

    #[test]
    fn full_reconcile_flow() {
        let server = server();

        let first = reconcile(&server, "10.0.0.1");
        let item = &first.result.items[0];
        assert_eq!(item.operation, ReconcileOperation::Insert);

        let second = reconcile(&server, "10.0.0.1");
        assert_eq!(second.result.items[0].operation, ReconcileOperation::NoChange);
        assert_eq!(second.result.items[0].sys_id, item.sys_id);

        let response = server.handle(&Request::get("/table/server").with_query(QUERY_PARAM, "name=web01"));
        let records = TableResponse::decode(&response.body).unwrap().result;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["sys_id"], json!(item.sys_id));
        assert_eq!(server.record_count("server"), 1);
    }

    #[test]
    fn errors_become_responses() {
        let server = server();
        assert_eq!(server.handle(&Request::get("/nope")).status, 404);

        server.inject_failure(Endpoint::ClassMeta { class_name: "server".into() }, 500);
        assert_eq!(server.handle(&Request::get("/cmdb/meta/server")).status, 500);
        server.clear_failures();
        assert_eq!(server.handle(&Request::get("/cmdb/meta/server")).status, 200);
    }

    #[test]
    fn shared_store() {
        let store = Arc::new(CmdbStore::new());
        store.define_class("server", ["ip"]);
        let server = CmdbServer::with_store(ServerConfig::default(), Arc::clone(&store));

        let mut record = RemoteRecord::new();
        record.insert("name".into(), json!("web01"));
        server.insert_record("server", record).unwrap();

        assert_eq!(store.record_count("server"), 1);
        assert_eq!(server.store().record_count("server"), 1);
    }
}
