//! HTTP transport implementation.
//!
//! This module provides an HTTP-based transport for the engine's client
//! traits. The actual HTTP client is abstracted via [`HttpClient`] so the
//! blocking reqwest client, a loopback client, or a test double can be
//! plugged in.

use crate::config::ConnectionConfig;
use crate::error::{CmdbError, CmdbResult};
use crate::transport::{ItemQueryClient, ItemWriteClient, SchemaClient};
use cmdb_protocol::{
    ClassMetaResponse, Endpoint, ErrorResponse, HttpMethod, IdentifyReconcileRequest,
    IdentifyReconcileResponse, TableQuery, TableResponse,
};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use zeroize::Zeroizing;

/// Basic auth credentials attached to every request.
#[derive(Clone)]
pub struct BasicAuth {
    /// User name.
    pub username: String,
    /// Password, wiped on drop.
    pub password: Zeroizing<String>,
}

impl BasicAuth {
    /// Creates basic auth credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute URL without query string.
    pub url: String,
    /// Query parameters (unencoded).
    pub query: Vec<(String, String)>,
    /// Credentials.
    pub auth: Option<BasicAuth>,
    /// JSON body, for POST.
    pub body: Option<Vec<u8>>,
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Errors are
/// connection-level failures; non-2xx responses are returned as `Ok`.
pub trait HttpClient: Send + Sync {
    /// Executes a request and returns the response.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// HTTP-based CMDB transport.
///
/// Implements all three client capabilities over JSON request/response
/// bodies, authenticating every call with basic auth.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL joined with the API root.
    api_url: String,
    /// Credentials for every request.
    auth: BasicAuth,
    /// HTTP client implementation.
    client: C,
    /// Connection state.
    connected: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport for `config`.
    pub fn new(config: &ConnectionConfig, client: C) -> Self {
        Self {
            api_url: config.api_url(),
            auth: BasicAuth {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the API URL requests are sent to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Checks if the transport is connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    /// Closes the transport; later calls fail without touching the network.
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    fn send(
        &self,
        endpoint: &Endpoint,
        query: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> CmdbResult<Vec<u8>> {
        if !self.is_connected() {
            return Err(CmdbError::transport_fatal("transport is closed"));
        }

        let request = HttpRequest {
            method: endpoint.method(),
            url: format!("{}{}", self.api_url, endpoint.path()),
            query,
            auth: Some(self.auth.clone()),
            body,
        };
        debug!(method = %request.method, url = %request.url, "sending CMDB request");

        let response = self.client.execute(request).map_err(|e| {
            self.set_error(&e);
            CmdbError::transport_retryable(e)
        })?;

        if !response.is_success() {
            let message = ErrorResponse::decode(&response.body)
                .map(|err| err.describe())
                .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).into_owned());
            self.set_error(&message);
            return Err(CmdbError::Remote {
                status: response.status,
                message,
            });
        }

        self.clear_error();
        Ok(response.body)
    }
}

impl<C: HttpClient> ItemQueryClient for HttpTransport<C> {
    fn query_items(&self, query: &TableQuery) -> CmdbResult<TableResponse> {
        let endpoint = Endpoint::TableQuery {
            table: query.table.clone(),
        };
        let body = self.send(&endpoint, query.query_pairs(), None)?;
        Ok(TableResponse::decode(&body)?)
    }
}

impl<C: HttpClient> SchemaClient for HttpTransport<C> {
    fn class_meta(&self, class_name: &str) -> CmdbResult<ClassMetaResponse> {
        let endpoint = Endpoint::ClassMeta {
            class_name: class_name.to_string(),
        };
        let body = self.send(&endpoint, Vec::new(), None)?;
        Ok(ClassMetaResponse::decode(&body)?)
    }
}

impl<C: HttpClient> ItemWriteClient for HttpTransport<C> {
    fn identify_reconcile(
        &self,
        request: &IdentifyReconcileRequest,
    ) -> CmdbResult<IdentifyReconcileResponse> {
        let payload = request.encode()?;
        let body = self.send(
            &Endpoint::IdentifyReconcile,
            request.query_pairs(),
            Some(payload),
        )?;
        Ok(IdentifyReconcileResponse::decode(&body)?)
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request whose URL has been reduced to its path.
    fn handle(&self, request: &HttpRequest, path: &str) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
#[derive(Clone)]
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
    /// Path prefix stripped from request URLs.
    api_path: String,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S, api_path: impl Into<String>) -> Self {
        Self {
            server,
            api_path: api_path.into(),
        }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        // Extract the path below the API root from the URL
        let path = request
            .url
            .find(&self.api_path)
            .map(|i| &request.url[i + self.api_path.len()..])
            .ok_or_else(|| format!("URL {} is outside {}", request.url, self.api_path))?
            .to_string();

        Ok(self.server.handle(&request, &path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdb_protocol::{ReconcileOperation, ReconciledItem};
    use std::collections::BTreeMap;

    struct TestClient {
        response: RwLock<Option<HttpResponse>>,
        requests: RwLock<Vec<HttpRequest>>,
        healthy: AtomicBool,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                requests: RwLock::new(Vec::new()),
                healthy: AtomicBool::new(true),
            }
        }

        fn set_response(&self, status: u16, body: Vec<u8>) {
            *self.response.write() = Some(HttpResponse { status, body });
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }
    }

    impl HttpClient for &TestClient {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            self.requests.write().push(request);
            self.response
                .read()
                .clone()
                .ok_or_else(|| "connection refused".into())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("https://dev.example.com/", "admin", "pw")
    }

    #[test]
    fn transport_creation() {
        let client = TestClient::new();
        let transport = HttpTransport::new(&config(), &client);
        assert_eq!(transport.api_url(), "https://dev.example.com/api/now");
        assert!(transport.is_connected());
    }

    #[test]
    fn transport_close() {
        let client = TestClient::new();
        let transport = HttpTransport::new(&config(), &client);
        transport.close();
        assert!(!transport.is_connected());

        let err = transport.class_meta("server").unwrap_err();
        assert!(!err.is_retryable());
        assert!(client.requests.read().is_empty());
    }

    #[test]
    fn transport_unhealthy_client() {
        let client = TestClient::new();
        client.set_healthy(false);
        let transport = HttpTransport::new(&config(), &client);
        assert!(!transport.is_connected());
    }

    #[test]
    fn query_sends_encoded_query_and_auth() {
        let client = TestClient::new();
        client.set_response(200, br#"{"result":[{"name":"web01","ip":"10.0.0.1"}]}"#.to_vec());
        let transport = HttpTransport::new(&config(), &client);

        let response = transport
            .query_items(&TableQuery::by_name("server", "web01"))
            .unwrap();
        assert_eq!(response.result.len(), 1);

        let requests = client.requests.read();
        let request = &requests[0];
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "https://dev.example.com/api/now/table/server");
        assert_eq!(
            request.query,
            vec![("sysparm_query".to_string(), "name=web01".to_string())]
        );
        let auth = request.auth.as_ref().unwrap();
        assert_eq!(auth.username, "admin");
        assert_eq!(auth.password.as_str(), "pw");
        assert!(request.body.is_none());
    }

    #[test]
    fn reconcile_posts_body_with_data_source() {
        let client = TestClient::new();
        let response = IdentifyReconcileResponse::new(vec![ReconciledItem::new(
            "server",
            ReconcileOperation::Insert,
            "abc123",
        )]);
        client.set_response(201, response.encode().unwrap());
        let transport = HttpTransport::new(&config(), &client);

        let request = IdentifyReconcileRequest::single("ServiceNow", "server", BTreeMap::new());
        let result = transport.identify_reconcile(&request).unwrap();
        assert_eq!(result.result.items[0].sys_id, "abc123");

        let requests = client.requests.read();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "https://dev.example.com/api/now/identifyreconcile");
        assert_eq!(
            requests[0].query,
            vec![("sysparm_data_source".to_string(), "ServiceNow".to_string())]
        );
        assert!(requests[0].body.is_some());
    }

    #[test]
    fn remote_error_body_is_described() {
        let client = TestClient::new();
        let body = ErrorResponse::new("User Not Authenticated", Some("bad password".into()));
        client.set_response(401, body.encode().unwrap());
        let transport = HttpTransport::new(&config(), &client);

        let err = transport.class_meta("server").unwrap_err();
        match err {
            CmdbError::Remote { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "User Not Authenticated: bad password");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(transport.last_error().is_some());
    }

    #[test]
    fn remote_error_with_plain_body() {
        let client = TestClient::new();
        client.set_response(502, b"Bad Gateway".to_vec());
        let transport = HttpTransport::new(&config(), &client);

        let err = transport.class_meta("server").unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn connection_failure_is_retryable() {
        let client = TestClient::new();
        let transport = HttpTransport::new(&config(), &client);
        let err = transport
            .query_items(&TableQuery::by_name("server", "web01"))
            .unwrap_err();
        assert!(matches!(err, CmdbError::Transport { retryable: true, .. }));
        assert_eq!(transport.last_error().as_deref(), Some("connection refused"));
    }

    #[test]
    fn undecodable_body_is_protocol_error() {
        let client = TestClient::new();
        client.set_response(200, b"<html>login</html>".to_vec());
        let transport = HttpTransport::new(&config(), &client);
        let err = transport.class_meta("server").unwrap_err();
        assert!(matches!(err, CmdbError::Protocol(_)));
    }

    #[test]
    fn basic_auth_debug_is_redacted() {
        let auth = BasicAuth::new("admin", "hunter2");
        let debug = format!("{auth:?}");
        assert!(!debug.contains("hunter2"));
    }
}
