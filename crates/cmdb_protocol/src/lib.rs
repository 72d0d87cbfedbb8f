//! # CMDB Protocol
//!
//! Wire types for the three remote CMDB endpoints used by the reconciler.
//!
//! This crate provides:
//! - `TableQuery` / `TableResponse` for reading current records
//! - `ClassMetaResponse` for reading class attribute definitions
//! - `IdentifyReconcileRequest` / `IdentifyReconcileResponse` for writes
//! - `Endpoint` routing shared by clients and the reference server
//! - Normalization of heterogeneous remote values to comparable strings
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod endpoint;
mod error;
mod messages;
mod value;

pub use endpoint::{Endpoint, HttpMethod, DATA_SOURCE_PARAM, QUERY_PARAM};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    AttributeMeta, ClassMeta, ClassMetaResponse, ErrorDetail, ErrorResponse,
    IdentifyReconcileItem, IdentifyReconcileRequest, IdentifyReconcileResponse, ReconcileOperation,
    ReconcileResult, ReconciledItem, ReconciledItemError, TableQuery, TableResponse,
};
pub use value::{field_text, normalize_value, RemoteRecord};
