//! Capability-scoped client traits for the remote CMDB.
//!
//! Each trait covers one remote endpoint so a session can hand the engine
//! exactly the capabilities it needs (read records, read schema, write).

use crate::error::{CmdbError, CmdbResult};
use cmdb_protocol::{
    ClassMetaResponse, IdentifyReconcileRequest, IdentifyReconcileResponse, ReconcileOperation,
    ReconciledItem, RemoteRecord, TableQuery, TableResponse,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Reads current records.
pub trait ItemQueryClient: Send + Sync {
    /// Returns the records matching `query`.
    fn query_items(&self, query: &TableQuery) -> CmdbResult<TableResponse>;
}

/// Reads class attribute definitions.
pub trait SchemaClient: Send + Sync {
    /// Returns the metadata of `class_name`.
    fn class_meta(&self, class_name: &str) -> CmdbResult<ClassMetaResponse>;
}

/// Creates or merges records.
pub trait ItemWriteClient: Send + Sync {
    /// Submits `request` to identify-and-reconcile.
    fn identify_reconcile(
        &self,
        request: &IdentifyReconcileRequest,
    ) -> CmdbResult<IdentifyReconcileResponse>;
}

/// A mock CMDB for testing.
///
/// Responses are configured up front; every call is counted so tests can
/// assert which endpoints were touched.
#[derive(Debug, Default)]
pub struct MockCmdb {
    records: Mutex<Vec<RemoteRecord>>,
    attributes: Mutex<Option<Vec<String>>>,
    reconcile_items: Mutex<Vec<ReconciledItem>>,
    query_failure: Mutex<Option<String>>,
    schema_failure: Mutex<Option<String>>,
    write_failure: Mutex<Option<String>>,
    last_write: Mutex<Option<IdentifyReconcileRequest>>,
    query_calls: AtomicUsize,
    schema_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl MockCmdb {
    /// Creates a mock with no records, no schema and no write response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the records returned by every query.
    pub fn set_records(&self, records: Vec<RemoteRecord>) {
        *self.records.lock() = records;
    }

    /// Sets the attribute elements returned by every schema fetch.
    pub fn set_attributes<I, S>(&self, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.attributes.lock() = Some(attributes.into_iter().map(Into::into).collect());
    }

    /// Makes identify-and-reconcile return one item with `sys_id`.
    pub fn set_reconcile_sys_id(&self, class_name: &str, sys_id: &str) {
        *self.reconcile_items.lock() = vec![ReconciledItem::new(
            class_name,
            ReconcileOperation::Insert,
            sys_id,
        )];
    }

    /// Sets the items returned by identify-and-reconcile.
    pub fn set_reconcile_items(&self, items: Vec<ReconciledItem>) {
        *self.reconcile_items.lock() = items;
    }

    /// Makes every query fail with a retryable transport error.
    pub fn fail_queries(&self, message: impl Into<String>) {
        *self.query_failure.lock() = Some(message.into());
    }

    /// Makes every schema fetch fail with a retryable transport error.
    pub fn fail_schema(&self, message: impl Into<String>) {
        *self.schema_failure.lock() = Some(message.into());
    }

    /// Makes every write fail with a retryable transport error.
    pub fn fail_writes(&self, message: impl Into<String>) {
        *self.write_failure.lock() = Some(message.into());
    }

    /// Clears all configured failures.
    pub fn clear_failures(&self) {
        *self.query_failure.lock() = None;
        *self.schema_failure.lock() = None;
        *self.write_failure.lock() = None;
    }

    /// Returns the last submitted write request.
    pub fn last_write(&self) -> Option<IdentifyReconcileRequest> {
        self.last_write.lock().clone()
    }

    /// Number of record queries issued.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Number of schema fetches issued.
    pub fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    /// Number of writes issued.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

impl ItemQueryClient for MockCmdb {
    fn query_items(&self, _query: &TableQuery) -> CmdbResult<TableResponse> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.query_failure.lock().clone() {
            return Err(CmdbError::transport_retryable(message));
        }
        Ok(TableResponse::new(self.records.lock().clone()))
    }
}

impl SchemaClient for MockCmdb {
    fn class_meta(&self, class_name: &str) -> CmdbResult<ClassMetaResponse> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.schema_failure.lock().clone() {
            return Err(CmdbError::transport_retryable(message));
        }
        match self.attributes.lock().clone() {
            Some(attributes) => Ok(ClassMetaResponse::new(class_name, attributes)),
            None => Err(CmdbError::Remote {
                status: 404,
                message: format!("class {class_name} not found"),
            }),
        }
    }
}

impl ItemWriteClient for MockCmdb {
    fn identify_reconcile(
        &self,
        request: &IdentifyReconcileRequest,
    ) -> CmdbResult<IdentifyReconcileResponse> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_write.lock() = Some(request.clone());
        if let Some(message) = self.write_failure.lock().clone() {
            return Err(CmdbError::transport_retryable(message));
        }
        Ok(IdentifyReconcileResponse::new(
            self.reconcile_items.lock().clone(),
        ))
    }
}
