//! Request and response bodies for the CMDB endpoints.
//!
//! Field names follow the remote JSON contract (`className`, `sysId`,
//! `result`, ...). Unknown fields in responses are ignored.

use crate::endpoint::{DATA_SOURCE_PARAM, QUERY_PARAM};
use crate::error::{ProtocolError, ProtocolResult};
use crate::value::RemoteRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

macro_rules! json_codec {
    ($ty:ty, $what:literal) => {
        impl $ty {
            /// Encodes to JSON bytes.
            pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
                serde_json::to_vec(self).map_err(|source| ProtocolError::Encode {
                    what: $what,
                    source,
                })
            }

            /// Decodes from JSON bytes.
            pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
                serde_json::from_slice(bytes).map_err(|source| ProtocolError::Decode {
                    what: $what,
                    source,
                })
            }
        }
    };
}

/// A Table API lookup: records of `table` matching an encoded query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    /// Table (class) to read.
    pub table: String,
    /// Encoded query, e.g. `name=web01`.
    pub query: String,
}

impl TableQuery {
    /// Creates a lookup of records of `table` whose `name` equals `name`.
    ///
    /// A `^` in the name is escaped as `^^` so it stays part of the value.
    pub fn by_name(table: impl Into<String>, name: &str) -> Self {
        Self {
            table: table.into(),
            query: format!("name={}", name.replace('^', "^^")),
        }
    }

    /// Returns the URL query parameters for this lookup.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        vec![(QUERY_PARAM.to_string(), self.query.clone())]
    }

    /// Parses the `field=value` terms of the encoded query.
    ///
    /// Terms are joined by `^` and `^^` is a literal caret. Terms without
    /// `=` are skipped.
    pub fn terms(&self) -> Vec<(String, String)> {
        let mut terms = Vec::new();
        let mut term = String::new();
        let mut chars = self.query.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '^' if chars.peek() == Some(&'^') => {
                    chars.next();
                    term.push('^');
                }
                '^' => push_term(&mut terms, std::mem::take(&mut term)),
                _ => term.push(c),
            }
        }
        push_term(&mut terms, term);
        terms
    }
}

fn push_term(terms: &mut Vec<(String, String)>, term: String) {
    if let Some((field, value)) = term.split_once('=') {
        terms.push((field.to_string(), value.to_string()));
    }
}

/// Table API response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableResponse {
    /// Matching records, in remote order.
    #[serde(default)]
    pub result: Vec<RemoteRecord>,
}

impl TableResponse {
    /// Creates a response carrying the given records.
    pub fn new(result: Vec<RemoteRecord>) -> Self {
        Self { result }
    }

    /// Returns the first matching record, if any.
    pub fn first(&self) -> Option<&RemoteRecord> {
        self.result.first()
    }
}

json_codec!(TableResponse, "table response");

/// One attribute of a CMDB class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMeta {
    /// Column name, the key used in record field maps.
    pub element: String,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Remote column type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl AttributeMeta {
    /// Creates an attribute with only its element name set.
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            label: None,
            kind: None,
        }
    }
}

/// Class metadata returned by the CMDB meta endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMeta {
    /// Class name.
    #[serde(default)]
    pub name: String,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Attribute definitions.
    #[serde(default)]
    pub attributes: Vec<AttributeMeta>,
}

impl ClassMeta {
    /// Returns the attribute element names.
    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.element.as_str())
    }
}

/// CMDB meta response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMetaResponse {
    /// Class metadata.
    pub result: ClassMeta,
}

impl ClassMetaResponse {
    /// Creates a response for `class_name` with the given attribute elements.
    pub fn new<I, S>(class_name: impl Into<String>, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            result: ClassMeta {
                name: class_name.into(),
                label: None,
                attributes: elements.into_iter().map(AttributeMeta::new).collect(),
            },
        }
    }
}

json_codec!(ClassMetaResponse, "class meta response");

/// One item submitted to identify-and-reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyReconcileItem {
    /// Target class.
    #[serde(rename = "className")]
    pub class_name: String,
    /// Field values to write.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Identify-and-reconcile request.
///
/// The data source travels as a query parameter; only `items` is sent as
/// the JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyReconcileRequest {
    /// Data source hint (`sysparm_data_source`).
    #[serde(skip)]
    pub data_source: String,
    /// Items to identify and reconcile.
    pub items: Vec<IdentifyReconcileItem>,
}

impl IdentifyReconcileRequest {
    /// Creates a request for a single item.
    pub fn single(
        data_source: impl Into<String>,
        class_name: impl Into<String>,
        values: BTreeMap<String, String>,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            items: vec![IdentifyReconcileItem {
                class_name: class_name.into(),
                values,
            }],
        }
    }

    /// Returns the URL query parameters for this request.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        if self.data_source.is_empty() {
            Vec::new()
        } else {
            vec![(DATA_SOURCE_PARAM.to_string(), self.data_source.clone())]
        }
    }
}

json_codec!(IdentifyReconcileRequest, "identify-reconcile request");

/// What identify-and-reconcile did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileOperation {
    /// A new record was inserted.
    Insert,
    /// An existing record was updated.
    Update,
    /// An existing record already matched.
    NoChange,
    /// Any operation name this client does not know.
    #[serde(other)]
    Unknown,
}

/// An error reported for a single reconciled item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledItemError {
    /// Error code, e.g. `INVALID_INPUT_DATA`.
    #[serde(default)]
    pub error: String,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
}

/// One item in an identify-and-reconcile response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledItem {
    /// Class of the reconciled record.
    #[serde(rename = "className")]
    pub class_name: String,
    /// Operation performed.
    pub operation: ReconcileOperation,
    /// Remote identity of the record.
    #[serde(rename = "sysId", default)]
    pub sys_id: String,
    /// Per-item errors; non-empty means the item was rejected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ReconciledItemError>,
}

impl ReconciledItem {
    /// Creates a successful item.
    pub fn new(
        class_name: impl Into<String>,
        operation: ReconcileOperation,
        sys_id: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            operation,
            sys_id: sys_id.into(),
            errors: Vec::new(),
        }
    }

    /// Creates a rejected item.
    pub fn rejected(class_name: impl Into<String>, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            operation: ReconcileOperation::Unknown,
            sys_id: String::new(),
            errors: vec![ReconciledItemError {
                error: error.into(),
                message: message.into(),
            }],
        }
    }

    /// Returns true if the remote rejected this item.
    pub fn is_rejected(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result wrapper of an identify-and-reconcile response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResult {
    /// Reconciled items, in request order.
    #[serde(default)]
    pub items: Vec<ReconciledItem>,
}

/// Identify-and-reconcile response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyReconcileResponse {
    /// Response payload.
    #[serde(default)]
    pub result: ReconcileResult,
}

impl IdentifyReconcileResponse {
    /// Creates a response with the given items.
    pub fn new(items: Vec<ReconciledItem>) -> Self {
        Self {
            result: ReconcileResult { items },
        }
    }
}

json_codec!(IdentifyReconcileResponse, "identify-reconcile response");

/// Error detail in a failed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Short message.
    #[serde(default)]
    pub message: String,
    /// Longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error detail.
    pub error: ErrorDetail,
    /// Remote status marker, usually `failure`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ErrorResponse {
    /// Creates a failure body.
    pub fn new(message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                detail,
            },
            status: Some("failure".into()),
        }
    }

    /// Returns `message: detail`, or just the message.
    pub fn describe(&self) -> String {
        match &self.error.detail {
            Some(detail) if !detail.is_empty() => format!("{}: {}", self.error.message, detail),
            _ => self.error.message.clone(),
        }
    }
}

json_codec!(ErrorResponse, "error response");
