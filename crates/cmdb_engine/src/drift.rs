//! Drift comparison between desired fields and a live record.
//!
//! Comparison has subset semantics: only desired keys are checked, and
//! extra fields on the remote record are ignored. Remote values are
//! normalized to text before comparing.

use cmdb_protocol::{field_text, RemoteRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// One desired field whose remote value differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDrift {
    /// Field name.
    pub field: String,
    /// Desired value.
    pub desired: String,
    /// Normalized remote value; `None` when the field is missing.
    pub current: Option<String>,
}

/// Lists the desired fields that are missing or different in `current`.
pub fn diff_fields(desired: &BTreeMap<String, String>, current: &RemoteRecord) -> Vec<FieldDrift> {
    desired
        .iter()
        .filter_map(|(field, want)| {
            let have = field_text(current, field);
            if have.as_deref() == Some(want.as_str()) {
                return None;
            }
            debug!(
                field = %field,
                desired = %want,
                current = ?have,
                "field drifted"
            );
            Some(FieldDrift {
                field: field.clone(),
                desired: want.clone(),
                current: have,
            })
        })
        .collect()
}

/// Returns true iff every desired field is present in `current` with an
/// equal normalized value.
pub fn is_up_to_date(desired: &BTreeMap<String, String>, current: &RemoteRecord) -> bool {
    desired
        .iter()
        .all(|(field, want)| field_text(current, field).as_deref() == Some(want.as_str()))
}
