//! Expansion of sparse user input into a model-ready feature row
//!
//! Every schema position is filled from the partial input when supplied,
//! otherwise from the default table. A field with neither is an error; there
//! is no implicit zero fill.

use crate::schema::{DefaultTable, FeatureSchema, FeatureVector, PartialInput, SchemaError};

/// Build a complete [`FeatureVector`] in schema order
///
/// Fails with [`SchemaError::UnknownField`] when the input names a field the
/// schema does not know, [`SchemaError::NonFinite`] for NaN or infinite
/// values, and [`SchemaError::MissingField`] when a field has no value and
/// no default.
pub fn reconcile(
    schema: &FeatureSchema,
    partial: &PartialInput,
    defaults: &DefaultTable,
) -> Result<FeatureVector, SchemaError> {
    for (field, value) in partial.iter() {
        if !schema.contains(field) {
            return Err(SchemaError::UnknownField(field.to_string()));
        }
        if !value.is_finite() {
            return Err(SchemaError::NonFinite {
                field: field.to_string(),
                value,
            });
        }
    }

    let values = schema
        .names()
        .iter()
        .map(|name| {
            partial
                .get(name)
                .or_else(|| defaults.get(name))
                .ok_or_else(|| SchemaError::MissingField(name.clone()))
        })
        .collect::<Result<Vec<f64>, SchemaError>>()?;

    Ok(FeatureVector::from_parts(schema.clone(), values))
}
