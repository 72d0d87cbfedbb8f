//! Class schema validation.
//!
//! Desired fields are checked against the attribute elements the remote
//! reports for the target class. Unknown fields are rejected with a list of
//! textually similar attributes to help fix typos.

use crate::error::{CmdbError, CmdbResult};
use crate::transport::SchemaClient;
use cmdb_protocol::ClassMetaResponse;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// The attribute names of one CMDB class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSchema {
    class_name: String,
    attributes: BTreeSet<String>,
}

impl ClassSchema {
    /// Creates a schema from attribute names.
    pub fn new<I, S>(class_name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class_name: class_name.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a schema from a meta endpoint response.
    ///
    /// Attributes with an empty element name are ignored.
    pub fn from_meta(class_name: &str, meta: &ClassMetaResponse) -> Self {
        Self::new(
            class_name,
            meta.result
                .elements()
                .filter(|element| !element.is_empty())
                .map(str::to_string),
        )
    }

    /// Returns the class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the attribute names in sorted order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(String::as_str)
    }

    /// Returns true if `field` is an attribute of the class (exact match).
    pub fn contains(&self, field: &str) -> bool {
        self.attributes.contains(field)
    }

    /// Returns the attributes textually similar to `field`.
    pub fn similar_to(&self, field: &str) -> Vec<String> {
        similar_attributes(self.attributes(), field)
    }

    /// Checks every desired field; fails on the first unknown one.
    pub fn validate(&self, fields: &BTreeMap<String, String>) -> CmdbResult<()> {
        for field in fields.keys() {
            if !self.contains(field) {
                return Err(CmdbError::UnknownField {
                    field: field.clone(),
                    class_name: self.class_name.clone(),
                    similar: self.similar_to(field),
                });
            }
        }
        Ok(())
    }
}

/// Returns the attributes that contain `field` or are contained in it,
/// ignoring ASCII case. Empty attributes never match.
pub fn similar_attributes<'a, I>(attributes: I, field: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = field.to_ascii_lowercase();
    let matches: BTreeSet<String> = attributes
        .into_iter()
        .filter(|attribute| !attribute.is_empty())
        .filter(|attribute| {
            let candidate = attribute.to_ascii_lowercase();
            candidate.contains(&needle) || needle.contains(&candidate)
        })
        .map(str::to_string)
        .collect();
    matches.into_iter().collect()
}

/// Validates desired fields against the live class schema.
pub struct SchemaValidator<'a> {
    client: &'a dyn SchemaClient,
}

impl<'a> SchemaValidator<'a> {
    /// Creates a validator backed by `client`.
    pub fn new(client: &'a dyn SchemaClient) -> Self {
        Self { client }
    }

    /// Fetches the schema of `class_name`.
    pub fn attributes_of(&self, class_name: &str) -> CmdbResult<ClassSchema> {
        let meta = self
            .client
            .class_meta(class_name)
            .map_err(|e| CmdbError::schema_unavailable(class_name, e))?;
        let schema = ClassSchema::from_meta(class_name, &meta);
        debug!(
            class = class_name,
            attributes = schema.attributes.len(),
            "fetched class schema"
        );
        Ok(schema)
    }

    /// Checks that every key of `fields` is an attribute of `class_name`.
    ///
    /// Fetches the schema once per call and does not cache it.
    pub fn validate(&self, class_name: &str, fields: &BTreeMap<String, String>) -> CmdbResult<()> {
        self.attributes_of(class_name)?.validate(fields)
    }
}
