//! Blocking reqwest implementation of [`HttpClient`].

use crate::config::ConnectionConfig;
use crate::error::{CmdbError, CmdbResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use cmdb_protocol::HttpMethod;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

const JSON: &str = "application/json";

/// HTTP client backed by `reqwest::blocking`.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Builds a client with the timeout and user agent of `config`.
    pub fn new(config: &ConnectionConfig) -> CmdbResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CmdbError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        builder = builder.header(ACCEPT, JSON);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(auth) = &request.auth {
            builder = builder.basic_auth(&auth.username, Some(auth.password.as_str()));
        }
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, JSON).body(body);
        }

        let response = builder.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn builds_from_config() {
        let config = ConnectionConfig::new("https://dev.example.com", "admin", "pw")
            .with_timeout(Duration::from_secs(2));
        assert!(ReqwestClient::new(&config).is_ok());
    }

    #[test]
    fn unreachable_host_is_an_error() {
        let config = ConnectionConfig::new("http://127.0.0.1:9", "admin", "pw")
            .with_timeout(Duration::from_millis(500));
        let client = ReqwestClient::new(&config).unwrap();
        let result = client.execute(HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}/table/server", config.api_url()),
            query: Vec::new(),
            auth: None,
            body: None,
        });
        assert!(result.is_err());
    }
}
