//! Desired-state records and their remote identity binding.

use crate::error::{CmdbError, CmdbResult};
use cmdb_protocol::{IdentifyReconcileRequest, TableQuery};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Field that always carries the record name in write payloads.
pub const NAME_FIELD: &str = "name";

/// Declared state of one configuration item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredRecord {
    /// Identify-and-reconcile data source hint.
    #[serde(rename = "sysParamDataSource")]
    pub data_source: String,
    /// Target CMDB class (table) name.
    pub class_name: String,
    /// Record name; also the lookup key.
    pub name: String,
    /// Desired field values.
    #[serde(default, rename = "values")]
    pub fields: BTreeMap<String, String>,
}

impl DesiredRecord {
    /// Creates a record with no fields.
    pub fn new(
        data_source: impl Into<String>,
        class_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            class_name: class_name.into(),
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a desired field value.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Checks that the record can be written.
    ///
    /// The class name becomes a URL path segment, so it is restricted to
    /// ASCII alphanumerics and underscores.
    pub fn validate(&self) -> CmdbResult<()> {
        if self.class_name.is_empty() {
            return Err(CmdbError::InvalidRecord("empty class name".into()));
        }
        if !self
            .class_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CmdbError::InvalidRecord(format!(
                "class name {} may only contain ASCII letters, digits and underscores",
                self.class_name
            )));
        }
        if self.name.is_empty() {
            return Err(CmdbError::InvalidRecord("empty name".into()));
        }
        Ok(())
    }

    /// Returns the field map to write: desired fields plus `name`.
    pub fn write_fields(&self) -> BTreeMap<String, String> {
        let mut fields = self.fields.clone();
        fields.insert(NAME_FIELD.to_string(), self.name.clone());
        fields
    }

    /// Builds the Table API lookup for this record.
    pub fn lookup_query(&self) -> TableQuery {
        TableQuery::by_name(self.class_name.clone(), &self.name)
    }

    /// Builds the identify-and-reconcile request for this record.
    pub fn reconcile_request(&self) -> IdentifyReconcileRequest {
        IdentifyReconcileRequest::single(
            self.data_source.clone(),
            self.class_name.clone(),
            self.write_fields(),
        )
    }
}

/// The remote primary key (`sys_id`) of a created record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteIdentity(String);

impl RemoteIdentity {
    /// Wraps a remote identity value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A desired record together with its remote identity, once created.
///
/// The identity is bound by the engine's Create and is never replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedRecord {
    /// Declared state.
    #[serde(rename = "forProvider")]
    pub desired: DesiredRecord,
    #[serde(
        rename = "externalName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    identity: Option<RemoteIdentity>,
}

impl ManagedRecord {
    /// Creates a record that has never been created remotely.
    pub fn new(desired: DesiredRecord) -> Self {
        Self {
            desired,
            identity: None,
        }
    }

    /// Rehydrates a record whose identity was persisted earlier.
    pub fn with_identity(desired: DesiredRecord, identity: RemoteIdentity) -> Self {
        Self {
            desired,
            identity: Some(identity),
        }
    }

    /// Returns the bound identity, if any.
    pub fn identity(&self) -> Option<&RemoteIdentity> {
        self.identity.as_ref()
    }

    /// Returns true once a remote identity is bound.
    pub fn is_bound(&self) -> bool {
        self.identity.is_some()
    }

    /// Binds `identity` unless one is already bound; returns the bound identity.
    pub(crate) fn bind_identity(&mut self, identity: RemoteIdentity) -> RemoteIdentity {
        match &self.identity {
            Some(existing) => {
                if *existing != identity {
                    warn!(
                        class = %self.desired.class_name,
                        name = %self.desired.name,
                        bound = %existing,
                        returned = %identity,
                        "remote returned a different identity; keeping the bound one"
                    );
                }
                existing.clone()
            }
            None => {
                self.identity = Some(identity.clone());
                identity
            }
        }
    }
}
