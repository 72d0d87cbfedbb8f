//! Endpoint routing relative to the API root (e.g. `/api/now`).

use crate::error::{ProtocolError, ProtocolResult};
use std::fmt;

/// Query parameter carrying an encoded Table API query.
pub const QUERY_PARAM: &str = "sysparm_query";

/// Query parameter carrying the identify-and-reconcile data source.
pub const DATA_SOURCE_PARAM: &str = "sysparm_data_source";

/// HTTP method used by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request.
    Get,
    /// POST request.
    Post,
}

impl HttpMethod {
    /// Returns the canonical method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote CMDB endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /table/{table}`: read records of a class.
    TableQuery {
        /// Table (class) name.
        table: String,
    },
    /// `GET /cmdb/meta/{class}`: read class attribute definitions.
    ClassMeta {
        /// Class name.
        class_name: String,
    },
    /// `POST /identifyreconcile`: create or merge records.
    IdentifyReconcile,
}

impl Endpoint {
    /// Returns the HTTP method for this endpoint.
    pub fn method(&self) -> HttpMethod {
        match self {
            Endpoint::TableQuery { .. } | Endpoint::ClassMeta { .. } => HttpMethod::Get,
            Endpoint::IdentifyReconcile => HttpMethod::Post,
        }
    }

    /// Returns the path relative to the API root.
    pub fn path(&self) -> String {
        match self {
            Endpoint::TableQuery { table } => format!("/table/{table}"),
            Endpoint::ClassMeta { class_name } => format!("/cmdb/meta/{class_name}"),
            Endpoint::IdentifyReconcile => "/identifyreconcile".to_string(),
        }
    }

    /// Parses a method and path (relative to the API root) into an endpoint.
    pub fn parse(method: HttpMethod, path: &str) -> ProtocolResult<Self> {
        let unknown = || ProtocolError::UnknownEndpoint {
            method: method.to_string(),
            path: path.to_string(),
        };

        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        let endpoint = match (method, segments.as_slice()) {
            (HttpMethod::Get, ["table", table]) => Endpoint::TableQuery {
                table: (*table).to_string(),
            },
            (HttpMethod::Get, ["cmdb", "meta", class_name]) => Endpoint::ClassMeta {
                class_name: (*class_name).to_string(),
            },
            (HttpMethod::Post, ["identifyreconcile"]) => Endpoint::IdentifyReconcile,
            _ => return Err(unknown()),
        };

        Ok(endpoint)
    }
}
