//! Feature schema, partial inputs, default tables and feature vectors
//!
//! The schema fixes the column order a model was fit against. Every
//! [`FeatureVector`] is built against exactly one schema and is immutable
//! once constructed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building schemas or reconciling inputs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("feature schema must contain at least one field")]
    Empty,

    #[error("field `{0}` appears more than once in the feature schema")]
    DuplicateField(String),

    #[error("field `{0}` has neither a supplied value nor a default")]
    MissingField(String),

    #[error("field `{0}` is not part of the feature schema")]
    UnknownField(String),

    #[error("field `{field}` has non-finite value {value}")]
    NonFinite { field: String, value: f64 },
}

/// Column names of the credit-card default dataset, in training order
pub const CREDIT_DEFAULT_FIELDS: [&str; 23] = [
    "LIMIT_BAL",
    "SEX",
    "EDUCATION",
    "MARRIAGE",
    "AGE",
    "PAY_0",
    "PAY_2",
    "PAY_3",
    "PAY_4",
    "PAY_5",
    "PAY_6",
    "BILL_AMT1",
    "BILL_AMT2",
    "BILL_AMT3",
    "BILL_AMT4",
    "BILL_AMT5",
    "BILL_AMT6",
    "PAY_AMT1",
    "PAY_AMT2",
    "PAY_AMT3",
    "PAY_AMT4",
    "PAY_AMT5",
    "PAY_AMT6",
];

/// Ordered, immutable list of named numeric fields
///
/// Cloning is cheap; clones share the same backing storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    fields: Arc<[String]>,
    positions: Arc<HashMap<String, usize>>,
}

impl FeatureSchema {
    /// Build a schema, rejecting empty and duplicate field lists
    pub fn new<I, S>(fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut positions = HashMap::with_capacity(fields.len());
        for (idx, name) in fields.iter().enumerate() {
            if positions.insert(name.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateField(name.clone()));
            }
        }

        Ok(Self {
            fields: fields.into(),
            positions: Arc::new(positions),
        })
    }

    /// The 23-column credit-card default schema
    pub fn credit_default() -> Self {
        let fields: Vec<String> = CREDIT_DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect();
        let positions = fields
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Self {
            fields: fields.into(),
            positions: Arc::new(positions),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in schema order
    pub fn names(&self) -> &[String] {
        &self.fields
    }

    /// Position of a field, if present
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Whether `names` matches this schema exactly, order included
    pub fn matches(&self, names: &[String]) -> bool {
        self.fields.as_ref() == names
    }
}

impl fmt::Debug for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields.iter()).finish()
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = SchemaError;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.fields.to_vec()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::credit_default()
    }
}

/// User-supplied subset of feature values for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialInput {
    values: BTreeMap<String, f64>,
}

impl PartialInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(field.into(), value)
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for PartialInput {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Fallback value per field, constant for the lifetime of the process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultTable {
    values: BTreeMap<String, f64>,
}

impl DefaultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for the credit-card default schema
    ///
    /// Demographic codes fall back to their most common category
    /// (SEX=1, EDUCATION=2, MARRIAGE=1); every other column falls back to 0.
    pub fn credit_default() -> Self {
        CREDIT_DEFAULT_FIELDS
            .iter()
            .map(|&name| {
                let value = match name {
                    "SEX" => 1.0,
                    "EDUCATION" => 2.0,
                    "MARRIAGE" => 1.0,
                    _ => 0.0,
                };
                (name, value)
            })
            .collect()
    }

    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fails on the first schema field without a declared default
    pub fn check_covers(&self, schema: &FeatureSchema) -> Result<(), SchemaError> {
        match schema.names().iter().find(|name| !self.values.contains_key(*name)) {
            Some(name) => Err(SchemaError::MissingField(name.clone())),
            None => Ok(()),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for DefaultTable {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A complete feature row in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: FeatureSchema,
    values: Box<[f64]>,
}

impl FeatureVector {
    /// Only the reconciler constructs vectors, so every slot is populated
    pub(crate) fn from_parts(schema: FeatureSchema, values: Vec<f64>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self {
            schema,
            values: values.into_boxed_slice(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named field
    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.position(name).map(|idx| self.values[idx])
    }

    /// `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.schema
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rejects_empty_and_duplicates() {
        assert_eq!(
            FeatureSchema::new(Vec::<String>::new()).unwrap_err(),
            SchemaError::Empty
        );
        assert_eq!(
            FeatureSchema::new(["AGE", "PAY_0", "AGE"]).unwrap_err(),
            SchemaError::DuplicateField("AGE".into())
        );
    }

    #[test]
    fn credit_schema_order() {
        let schema = FeatureSchema::credit_default();
        assert_eq!(schema.len(), 23);
        assert_eq!(schema.position("LIMIT_BAL"), Some(0));
        assert_eq!(schema.position("PAY_0"), Some(5));
        assert_eq!(schema.position("PAY_AMT6"), Some(22));
        assert!(!schema.contains("PAY_1"));
    }

    #[test]
    fn schema_serde_roundtrip_rebuilds_positions() {
        let schema = FeatureSchema::new(["a", "b", "c"]).unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#"["a","b","c"]"#);

        let restored: FeatureSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.position("c"), Some(2));

        let dup: Result<FeatureSchema, _> = serde_json::from_str(r#"["a","a"]"#);
        assert!(dup.is_err());
    }

    #[test]
    fn credit_defaults_cover_credit_schema() {
        let defaults = DefaultTable::credit_default();
        let schema = FeatureSchema::credit_default();
        assert!(defaults.check_covers(&schema).is_ok());
        assert_eq!(defaults.get("SEX"), Some(1.0));
        assert_eq!(defaults.get("EDUCATION"), Some(2.0));
        assert_eq!(defaults.get("MARRIAGE"), Some(1.0));
        assert_eq!(defaults.get("BILL_AMT3"), Some(0.0));
    }

    #[test]
    fn check_covers_names_first_gap() {
        let schema = FeatureSchema::new(["x", "y", "z"]).unwrap();
        let defaults = DefaultTable::new().with("x", 0.0).with("z", 0.0);
        assert_eq!(
            defaults.check_covers(&schema),
            Err(SchemaError::MissingField("y".into()))
        );
    }

    #[test]
    fn partial_input_builders() {
        let partial = PartialInput::new().with("AGE", 35.0).with("PAY_0", 0.0);
        assert_eq!(partial.len(), 2);
        assert_eq!(partial.get("AGE"), Some(35.0));
        assert_eq!(partial.get("SEX"), None);

        let collected: PartialInput = [("AGE", 40.0)].into_iter().collect();
        assert_eq!(collected.get("AGE"), Some(40.0));
    }
}
