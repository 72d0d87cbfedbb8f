//! In-memory class and record storage.
//!
//! The store keeps, per class, the attribute definitions and the records
//! written so far. Writes follow identify-and-reconcile semantics: an item
//! is identified by class and `name`, merged into a matching record when
//! one exists, and inserted otherwise.

use crate::error::{ServerError, ServerResult};
use cmdb_protocol::{
    field_text, IdentifyReconcileItem, ReconcileOperation, ReconciledItem, RemoteRecord,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

/// Field identifying a record within its class.
pub const IDENTIFY_FIELD: &str = "name";

/// Primary key field set on every stored record.
pub const SYS_ID_FIELD: &str = "sys_id";

/// Class name field set on every stored record.
pub const CLASS_FIELD: &str = "sys_class_name";

#[derive(Debug, Default)]
struct ClassTable {
    attributes: BTreeSet<String>,
    records: Vec<RemoteRecord>,
}

/// In-memory CMDB storage.
#[derive(Debug, Default)]
pub struct CmdbStore {
    classes: RwLock<BTreeMap<String, ClassTable>>,
}

impl CmdbStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a class, or adds attributes to an existing one.
    ///
    /// `name`, `sys_id` and `sys_class_name` are always attributes.
    pub fn define_class<I, S>(&self, class_name: &str, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes = self.classes.write();
        let table = classes.entry(class_name.to_string()).or_default();
        table.attributes.extend(attributes.into_iter().map(Into::into));
        for builtin in [IDENTIFY_FIELD, SYS_ID_FIELD, CLASS_FIELD] {
            table.attributes.insert(builtin.to_string());
        }
    }

    /// Returns true if `class_name` is defined.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes.read().contains_key(class_name)
    }

    /// Returns the attributes of `class_name` in sorted order.
    pub fn attributes(&self, class_name: &str) -> ServerResult<Vec<String>> {
        self.classes
            .read()
            .get(class_name)
            .map(|table| table.attributes.iter().cloned().collect())
            .ok_or_else(|| ServerError::UnknownClass(class_name.to_string()))
    }

    /// Stores `record` as is, assigning a `sys_id` if it has none.
    ///
    /// Bypasses identification; used to seed the store.
    pub fn insert_record(&self, class_name: &str, mut record: RemoteRecord) -> ServerResult<String> {
        let mut classes = self.classes.write();
        let table = classes
            .get_mut(class_name)
            .ok_or_else(|| ServerError::UnknownClass(class_name.to_string()))?;

        let sys_id = match field_text(&record, SYS_ID_FIELD) {
            Some(id) if !id.is_empty() => id,
            _ => new_sys_id(),
        };
        record.insert(SYS_ID_FIELD.to_string(), Value::String(sys_id.clone()));
        record.insert(
            CLASS_FIELD.to_string(),
            Value::String(class_name.to_string()),
        );
        table.records.push(record);
        Ok(sys_id)
    }

    /// Returns the records of `class_name` matching every `field=value` term.
    pub fn query(
        &self,
        class_name: &str,
        terms: &[(&str, &str)],
        limit: usize,
    ) -> ServerResult<Vec<RemoteRecord>> {
        let classes = self.classes.read();
        let table = classes
            .get(class_name)
            .ok_or_else(|| ServerError::UnknownClass(class_name.to_string()))?;

        Ok(table
            .records
            .iter()
            .filter(|record| {
                terms
                    .iter()
                    .all(|(field, value)| field_text(record, field).as_deref() == Some(*value))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    /// Returns the record of `class_name` with the given `sys_id`.
    pub fn get(&self, class_name: &str, sys_id: &str) -> Option<RemoteRecord> {
        self.query(class_name, &[(SYS_ID_FIELD, sys_id)], 1)
            .ok()
            .and_then(|records| records.into_iter().next())
    }

    /// Returns the number of records in `class_name`.
    pub fn record_count(&self, class_name: &str) -> usize {
        self.classes
            .read()
            .get(class_name)
            .map_or(0, |table| table.records.len())
    }

    /// Identifies and reconciles one item.
    ///
    /// Values for fields that are not attributes of the class are dropped.
    /// Problems with the item are reported on the returned item rather than
    /// as an error.
    pub fn identify_reconcile(&self, item: &IdentifyReconcileItem) -> ReconciledItem {
        let mut classes = self.classes.write();
        let Some(table) = classes.get_mut(&item.class_name) else {
            return ReconciledItem::rejected(
                &item.class_name,
                "INVALID_INPUT_DATA",
                format!("class {} is not defined", item.class_name),
            );
        };
        let name = match item.values.get(IDENTIFY_FIELD) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => {
                return ReconciledItem::rejected(
                    &item.class_name,
                    "MISSING_MATCHING_ATTRIBUTES",
                    "no identification rule matched: name is required",
                )
            }
        };

        let values: BTreeMap<&str, &str> = item
            .values
            .iter()
            .filter(|(field, _)| {
                let known = table.attributes.contains(field.as_str());
                if !known {
                    debug!(class = %item.class_name, field = %field, "dropping unknown field");
                }
                known && field.as_str() != SYS_ID_FIELD && field.as_str() != CLASS_FIELD
            })
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .collect();

        let existing = table
            .records
            .iter_mut()
            .find(|record| field_text(record, IDENTIFY_FIELD).as_deref() == Some(name.as_str()));

        match existing {
            Some(record) => {
                let mut changed = false;
                for (field, value) in &values {
                    if field_text(record, field).as_deref() != Some(*value) {
                        record.insert((*field).to_string(), Value::String((*value).to_string()));
                        changed = true;
                    }
                }
                let sys_id = field_text(record, SYS_ID_FIELD).unwrap_or_default();
                let operation = if changed {
                    ReconcileOperation::Update
                } else {
                    ReconcileOperation::NoChange
                };
                debug!(class = %item.class_name, name = %name, sys_id = %sys_id, ?operation, "reconciled record");
                ReconciledItem::new(&item.class_name, operation, sys_id)
            }
            None => {
                let sys_id = new_sys_id();
                let mut record: RemoteRecord = values
                    .iter()
                    .map(|(field, value)| ((*field).to_string(), Value::String((*value).to_string())))
                    .collect();
                record.insert(SYS_ID_FIELD.to_string(), Value::String(sys_id.clone()));
                record.insert(
                    CLASS_FIELD.to_string(),
                    Value::String(item.class_name.clone()),
                );
                table.records.push(record);
                debug!(class = %item.class_name, name = %name, sys_id = %sys_id, "inserted record");
                ReconciledItem::new(&item.class_name, ReconcileOperation::Insert, sys_id)
            }
        }
    }
}

fn new_sys_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(class_name: &str, pairs: &[(&str, &str)]) -> IdentifyReconcileItem {
        IdentifyReconcileItem {
            class_name: class_name.to_string(),
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn store() -> CmdbStore {
        let store = CmdbStore::new();
        store.define_class("server", ["ip"]);
        store
    }

    #[test]
    fn builtin_attributes() {
        let store = store();
        assert_eq!(
            store.attributes("server").unwrap(),
            vec!["ip", "name", "sys_class_name", "sys_id"]
        );
        assert!(matches!(
            store.attributes("nope"),
            Err(ServerError::UnknownClass(_))
        ));
    }

    #[test]
    fn insert_then_no_change_then_update() {
        let store = store();

        let first = store.identify_reconcile(&item("server", &[("name", "web01"), ("ip", "10.0.0.1")]));
        assert_eq!(first.operation, ReconcileOperation::Insert);
        assert_eq!(first.sys_id.len(), 32);

        let second = store.identify_reconcile(&item("server", &[("name", "web01"), ("ip", "10.0.0.1")]));
        assert_eq!(second.operation, ReconcileOperation::NoChange);
        assert_eq!(second.sys_id, first.sys_id);

        let third = store.identify_reconcile(&item("server", &[("name", "web01"), ("ip", "10.0.0.2")]));
        assert_eq!(third.operation, ReconcileOperation::Update);
        assert_eq!(third.sys_id, first.sys_id);

        assert_eq!(store.record_count("server"), 1);
        let record = store.get("server", &first.sys_id).unwrap();
        assert_eq!(record["ip"], json!("10.0.0.2"));
        assert_eq!(record["sys_class_name"], json!("server"));
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let store = store();
        let result = store.identify_reconcile(&item("server", &[("name", "web01"), ("os", "linux")]));
        let record = store.get("server", &result.sys_id).unwrap();
        assert!(!record.contains_key("os"));
    }

    #[test]
    fn rejected_items() {
        let store = store();
        let result = store.identify_reconcile(&item("nope", &[("name", "web01")]));
        assert!(result.is_rejected());
        assert_eq!(result.errors[0].error, "INVALID_INPUT_DATA");

        let result = store.identify_reconcile(&item("server", &[("ip", "10.0.0.1")]));
        assert!(result.is_rejected());
        assert_eq!(store.record_count("server"), 0);
    }

    #[test]
    fn query_filters_by_terms() {
        let store = store();
        let mut seeded = RemoteRecord::new();
        seeded.insert("name".into(), json!("web01"));
        seeded.insert("ip".into(), json!("10.0.0.1"));
        let sys_id = store.insert_record("server", seeded).unwrap();
        store.identify_reconcile(&item("server", &[("name", "web02")]));

        let found = store.query("server", &[("name", "web01")], 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["sys_id"], json!(sys_id));

        assert_eq!(store.query("server", &[], 10).unwrap().len(), 2);
        assert_eq!(store.query("server", &[], 1).unwrap().len(), 1);
        assert!(store.query("server", &[("name", "web03")], 10).unwrap().is_empty());
        assert!(store.query("nope", &[], 10).is_err());
    }

    #[test]
    fn insert_record_keeps_given_sys_id() {
        let store = store();
        let mut seeded = RemoteRecord::new();
        seeded.insert("sys_id".into(), json!("abc123"));
        seeded.insert("name".into(), json!("web01"));
        assert_eq!(store.insert_record("server", seeded).unwrap(), "abc123");
        assert!(store.get("server", "abc123").is_some());
    }
}
