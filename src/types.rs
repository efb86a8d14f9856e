//! Core types for the encoding pipeline
//!
//! This module defines the data structures that flow through each stage:
//! raw form inputs, encoded values, the field-keyed validation errors and
//! the single-row frame handed to the classifier.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::error::EwsError;

/// A value as entered in a form control.
///
/// Dropdowns produce text; number fields may produce text or a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    /// Textual form used for dropdown lookups
    pub fn as_display(&self) -> Cow<'_, str> {
        match self {
            RawValue::Text(s) => Cow::Borrowed(s.as_str()),
            RawValue::Integer(i) => Cow::Owned(i.to_string()),
            RawValue::Float(f) => Cow::Owned(f.to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

/// Raw per-field inputs collected for one submission attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawInputs {
    values: BTreeMap<String, RawValue>,
}

impl RawInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `feature -> value`
    pub fn from_json(json: &str) -> Result<Self, EwsError> {
        let inputs: RawInputs = serde_json::from_str(json)?;
        Ok(inputs)
    }

    /// Set a field, returning the previous value if any
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<RawValue>,
    ) -> Option<RawValue> {
        self.values.insert(name.into(), value.into())
    }

    /// Builder-style variant of [`RawInputs::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<RawValue> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawInputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut inputs = RawInputs::new();
        for (k, v) in iter {
            inputs.insert(k, v);
        }
        inputs
    }
}

/// A value in the classifier's training-time representation.
///
/// Text values are case-sensitive: "GP" and "gp" are different categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodedValue {
    Int(i64),
    Text(String),
}

impl EncodedValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EncodedValue::Int(i) => Some(*i),
            EncodedValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EncodedValue::Int(_) => None,
            EncodedValue::Text(s) => Some(s.as_str()),
        }
    }
}

impl fmt::Display for EncodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodedValue::Int(i) => write!(f, "{i}"),
            EncodedValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for EncodedValue {
    fn from(value: &str) -> Self {
        EncodedValue::Text(value.to_string())
    }
}

impl From<i64> for EncodedValue {
    fn from(value: i64) -> Self {
        EncodedValue::Int(value)
    }
}

/// Fully validated, schema-ordered feature values.
///
/// Only the encoder constructs these, and only once every field validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EncodedVector(Vec<EncodedValue>);

impl EncodedVector {
    pub(crate) fn new(values: Vec<EncodedValue>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EncodedValue> {
        self.0.get(index)
    }

    pub fn values(&self) -> &[EncodedValue] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &EncodedValue> {
        self.0.iter()
    }

    pub fn into_values(self) -> Vec<EncodedValue> {
        self.0
    }
}

/// Field-keyed validation messages; non-empty iff encoding failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(transparent)]
#[error("{}", describe_errors(.0))]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, feature: &str, message: impl Into<String>) {
        self.0.insert(feature.to_string(), message.into());
    }

    pub fn get(&self, feature: &str) -> Option<&str> {
        self.0.get(feature).map(String::as_str)
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.0.contains_key(feature)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn describe_errors(errors: &BTreeMap<String, String>) -> String {
    if errors.is_empty() {
        return "0 field(s) failed validation".to_string();
    }
    let fields: Vec<String> = errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect();
    format!("{} field(s) failed validation: {}", errors.len(), fields.join("; "))
}

/// Named tabular input for a classifier.
///
/// Columns are matched by name, never by position, so the frame always
/// carries the schema's column labels alongside the values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureFrame {
    columns: Vec<String>,
    rows: Vec<Vec<EncodedValue>>,
}

impl FeatureFrame {
    /// Build a frame, checking every row has one value per column
    pub fn new(columns: Vec<String>, rows: Vec<Vec<EncodedValue>>) -> Result<Self, EwsError> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(EwsError::InvalidInput(format!(
                "row {} has {} values for {} columns",
                idx,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Single-row frame labelled with the given column names
    pub fn single_row(columns: Vec<String>, vector: &EncodedVector) -> Result<Self, EwsError> {
        Self::new(columns, vec![vector.values().to_vec()])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<EncodedValue>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_inputs_from_json_mixed_values() {
        let inputs = RawInputs::from_json(r#"{"school": "GP", "age": 17, "G1": 12.5}"#).unwrap();

        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs.get("school"), Some(&RawValue::Text("GP".to_string())));
        assert_eq!(inputs.get("age"), Some(&RawValue::Integer(17)));
        assert_eq!(inputs.get("G1"), Some(&RawValue::Float(12.5)));
    }

    #[test]
    fn test_raw_inputs_rejects_non_object() {
        assert!(RawInputs::from_json("[1, 2, 3]").is_err());
        assert!(RawInputs::from_json(r#"{"higher": true}"#).is_err());
    }

    #[test]
    fn test_raw_value_display() {
        assert_eq!(RawValue::from("yes").as_display(), "yes");
        assert_eq!(RawValue::from(3i64).as_display(), "3");
        assert_eq!(RawValue::from(2.0f64).as_display(), "2");
    }

    #[test]
    fn test_encoded_value_serializes_untagged() {
        let values = vec![EncodedValue::from("GP"), EncodedValue::from(17i64)];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["GP",17]"#);
    }

    #[test]
    fn test_validation_errors_display() {
        let mut errors = ValidationErrors::new();
        errors.insert("age", "Enter a number");
        errors.insert("sex", "Choose a valid option");

        assert_eq!(
            errors.to_string(),
            "2 field(s) failed validation: age: Enter a number; sex: Choose a valid option"
        );
    }

    #[test]
    fn test_validation_errors_is_an_error() {
        let mut errors = ValidationErrors::new();
        errors.insert("age", "Enter a number");

        let err: Box<dyn std::error::Error> = Box::new(errors);
        assert_eq!(err.to_string(), "1 field(s) failed validation: age: Enter a number");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_frame_rejects_ragged_rows() {
        let result = FeatureFrame::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![EncodedValue::Int(1)]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_column_lookup() {
        let frame = FeatureFrame::new(
            vec!["school".to_string(), "age".to_string()],
            vec![vec![EncodedValue::from("MS"), EncodedValue::Int(18)]],
        )
        .unwrap();

        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.column_index("age"), Some(1));
        assert_eq!(frame.column_index("G3"), None);
    }
}
