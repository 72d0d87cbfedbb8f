//! The reconciliation engine.
//!
//! The engine converges one managed record at a time towards its desired
//! state. Observe infers the record's [`RecordState`]; Create, Update and
//! Delete act on it. Every operation is a single synchronous call chain
//! over the session's clients.

use crate::config::{DeletionPolicy, EngineOptions, LookupFailurePolicy};
use crate::drift::{diff_fields, is_up_to_date, FieldDrift};
use crate::error::{CmdbError, CmdbResult, WriteOperation};
use crate::record::{DesiredRecord, ManagedRecord, RemoteIdentity, NAME_FIELD};
use crate::schema::SchemaValidator;
use crate::session::Session;
use cmdb_protocol::{IdentifyReconcileRequest, ReconcileOperation, ReconciledItem};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// State of a managed record as inferred by Observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Never created, or the lookup found nothing.
    Absent,
    /// Found, with at least one differing field.
    Drifted,
    /// Found, with all desired fields matching.
    Synced,
}

/// Result of observing a managed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Whether the remote record exists.
    pub exists: bool,
    /// Whether every desired field matches.
    pub up_to_date: bool,
    /// Differing fields, for diagnostics.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drift: Vec<FieldDrift>,
}

impl Observation {
    /// An observation of a missing record.
    pub fn absent() -> Self {
        Self {
            exists: false,
            up_to_date: false,
            drift: Vec::new(),
        }
    }

    /// Returns the inferred record state.
    pub fn state(&self) -> RecordState {
        match (self.exists, self.up_to_date) {
            (false, _) => RecordState::Absent,
            (true, false) => RecordState::Drifted,
            (true, true) => RecordState::Synced,
        }
    }
}

/// Result of a successful Create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Creation {
    /// The bound identity.
    pub identity: RemoteIdentity,
    /// What the remote did.
    pub operation: ReconcileOperation,
}

/// Result of a successful Update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    /// The (unchanged) bound identity.
    pub identity: RemoteIdentity,
    /// What the remote did.
    pub operation: ReconcileOperation,
}

/// Result of a Delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Deletion {
    /// The remote record was left in place.
    Orphaned,
    /// The retirement marker was written.
    Retired,
    /// No identity was bound, so there was nothing to retire.
    NeverCreated,
}

/// Result of one reconcile cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CycleOutcome {
    /// The record was absent and has been created.
    Created(Creation),
    /// The record had drifted and has been updated.
    Updated(UpdateOutcome),
    /// Nothing to do.
    UpToDate,
}

/// Lookup failure policy: report the record as absent.
///
/// The next cycle then re-creates it, which identify-and-reconcile merges
/// into the existing record.
pub fn treat_lookup_failure_as_absent(err: &CmdbError) -> Observation {
    warn!(error = %err, "lookup failed; treating record as absent");
    Observation::absent()
}

/// Drives managed records towards their desired state.
pub struct ReconciliationEngine {
    session: Session,
    options: EngineOptions,
}

impl ReconciliationEngine {
    /// Creates an engine over `session`.
    pub fn new(session: Session, options: EngineOptions) -> Self {
        Self { session, options }
    }

    /// Returns the engine options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Returns the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Infers whether the record exists remotely and whether it matches.
    ///
    /// A record with no bound identity is reported absent without any
    /// remote call. Unknown desired fields fail the observation.
    pub fn observe(&self, record: &ManagedRecord) -> CmdbResult<Observation> {
        let desired = &record.desired;
        let Some(identity) = record.identity() else {
            debug!(
                class = %desired.class_name,
                name = %desired.name,
                "no identity bound; record is absent"
            );
            return Ok(Observation::absent());
        };
        desired.validate()?;

        let response = match self.session.query().query_items(&desired.lookup_query()) {
            Ok(response) => response,
            Err(err) => {
                return match self.options.lookup_failure {
                    LookupFailurePolicy::TreatAsAbsent => Ok(treat_lookup_failure_as_absent(&err)),
                    LookupFailurePolicy::Propagate => Err(err),
                }
            }
        };

        let Some(current) = response.first() else {
            info!(
                class = %desired.class_name,
                name = %desired.name,
                identity = %identity,
                "remote record not found"
            );
            return Ok(Observation::absent());
        };

        SchemaValidator::new(self.session.schema())
            .validate(&desired.class_name, &desired.fields)?;

        // Compare what a write would send, so `name` always means the record name.
        let fields = desired.write_fields();
        let up_to_date = is_up_to_date(&fields, current);
        let drift = if up_to_date {
            Vec::new()
        } else {
            diff_fields(&fields, current)
        };
        debug!(
            class = %desired.class_name,
            name = %desired.name,
            identity = %identity,
            up_to_date,
            drifted = drift.len(),
            "observed record"
        );

        Ok(Observation {
            exists: true,
            up_to_date,
            drift,
        })
    }

    /// Creates the record remotely and binds its identity.
    ///
    /// Calling this again for an already-created record merges into the
    /// same remote record and keeps the bound identity.
    pub fn create(&self, record: &mut ManagedRecord) -> CmdbResult<Creation> {
        let desired = &record.desired;
        desired.validate()?;
        if self.options.validate_on_create {
            SchemaValidator::new(self.session.schema())
                .validate(&desired.class_name, &desired.fields)?;
        }

        let item = self.submit(WriteOperation::Create, desired, &desired.reconcile_request())?;
        let identity = record.bind_identity(RemoteIdentity::new(item.sys_id));
        info!(
            class = %record.desired.class_name,
            name = %record.desired.name,
            identity = %identity,
            operation = ?item.operation,
            "created configuration item"
        );

        Ok(Creation {
            identity,
            operation: item.operation,
        })
    }

    /// Writes the desired fields over a drifted record.
    ///
    /// Never rebinds the identity.
    pub fn update(&self, record: &ManagedRecord) -> CmdbResult<UpdateOutcome> {
        let desired = &record.desired;
        let identity = record.identity().ok_or(CmdbError::IdentityNotBound)?;
        desired.validate()?;

        let item = self.submit(WriteOperation::Update, desired, &desired.reconcile_request())?;
        if item.sys_id != identity.as_str() {
            warn!(
                class = %desired.class_name,
                name = %desired.name,
                identity = %identity,
                returned = %item.sys_id,
                "remote returned a different identity; keeping the bound one"
            );
        }
        info!(
            class = %desired.class_name,
            name = %desired.name,
            identity = %identity,
            operation = ?item.operation,
            "updated configuration item"
        );

        Ok(UpdateOutcome {
            identity: identity.clone(),
            operation: item.operation,
        })
    }

    /// Handles removal of a managed record according to the deletion policy.
    pub fn delete(&self, record: &ManagedRecord) -> CmdbResult<Deletion> {
        let desired = &record.desired;
        match &self.options.deletion {
            DeletionPolicy::Orphan => {
                info!(
                    class = %desired.class_name,
                    name = %desired.name,
                    identity = ?record.identity().map(RemoteIdentity::as_str),
                    "leaving remote record in place"
                );
                Ok(Deletion::Orphaned)
            }
            DeletionPolicy::Retire { field, value } => {
                let Some(identity) = record.identity() else {
                    debug!(
                        class = %desired.class_name,
                        name = %desired.name,
                        "no identity bound; nothing to retire"
                    );
                    return Ok(Deletion::NeverCreated);
                };
                desired.validate()?;

                let values = BTreeMap::from([
                    (NAME_FIELD.to_string(), desired.name.clone()),
                    (field.clone(), value.clone()),
                ]);
                let request = IdentifyReconcileRequest::single(
                    desired.data_source.clone(),
                    desired.class_name.clone(),
                    values,
                );
                self.submit(WriteOperation::Delete, desired, &request)?;
                info!(
                    class = %desired.class_name,
                    name = %desired.name,
                    identity = %identity,
                    field = %field,
                    "retired configuration item"
                );
                Ok(Deletion::Retired)
            }
        }
    }

    /// Runs one observe-then-act cycle.
    pub fn reconcile(&self, record: &mut ManagedRecord) -> CmdbResult<CycleOutcome> {
        let observation = self.observe(record)?;
        match observation.state() {
            RecordState::Absent => Ok(CycleOutcome::Created(self.create(record)?)),
            RecordState::Drifted => Ok(CycleOutcome::Updated(self.update(record)?)),
            RecordState::Synced => Ok(CycleOutcome::UpToDate),
        }
    }

    /// Submits one identify-and-reconcile write and returns its first item.
    fn submit(
        &self,
        operation: WriteOperation,
        desired: &DesiredRecord,
        request: &IdentifyReconcileRequest,
    ) -> CmdbResult<ReconciledItem> {
        debug!(
            class = %desired.class_name,
            name = %desired.name,
            %operation,
            "submitting identify-and-reconcile"
        );
        let response = self
            .session
            .write()
            .identify_reconcile(request)
            .map_err(|e| CmdbError::write_failed(operation, e))?;

        let item = response
            .result
            .items
            .into_iter()
            .next()
            .ok_or_else(|| CmdbError::write_failed(operation, CmdbError::EmptyReconcileResult))?;

        if item.is_rejected() {
            let reasons = item
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.error, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CmdbError::write_failed(
                operation,
                CmdbError::ReconcileRejected(reasons),
            ));
        }
        if item.sys_id.is_empty() {
            return Err(CmdbError::write_failed(
                operation,
                CmdbError::Protocol("reconciled item has no sysId".into()),
            ));
        }
        Ok(item)
    }
}
