//! One-shot export of submitted inputs
//!
//! Produces a JSON document with the raw form values and, when the
//! submission encoded, the exact values sent to the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::encoder::FeatureEncoder;
use crate::error::EwsError;
use crate::schema::Schema;
use crate::types::{EncodedValue, EncodedVector, RawInputs};
use crate::{EWS_VERSION, PRODUCER_NAME};

/// Suggested file name for a downloaded export
pub const EXPORT_FILE_NAME: &str = "stress_input.json";

/// Export producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProducer {
    pub name: String,
    pub version: String,
}

/// Exported submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub export_id: String,
    pub exported_at_utc: DateTime<Utc>,
    pub producer: ExportProducer,
    pub inputs: RawInputs,
    /// Values sent to the model, keyed by feature name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded: Option<BTreeMap<String, EncodedValue>>,
}

impl ExportDocument {
    /// Export of raw inputs only
    pub fn new(inputs: &RawInputs) -> Self {
        Self {
            export_id: Uuid::new_v4().to_string(),
            exported_at_utc: Utc::now(),
            producer: ExportProducer {
                name: PRODUCER_NAME.to_string(),
                version: EWS_VERSION.to_string(),
            },
            inputs: inputs.clone(),
            encoded: None,
        }
    }

    /// Attach the encoded vector, labelled with the schema's column names
    pub fn with_encoded(mut self, schema: &Schema, vector: &EncodedVector) -> Self {
        self.encoded = Some(
            schema
                .ordered_names()
                .into_iter()
                .map(str::to_string)
                .zip(vector.iter().cloned())
                .collect(),
        );
        self
    }

    pub fn to_json(&self) -> Result<String, EwsError> {
        serde_json::to_string_pretty(self).map_err(EwsError::JsonError)
    }
}

/// Export raw inputs, adding the encoded values when `encoder` accepts them
pub fn export_inputs(
    inputs: &RawInputs,
    schema: &Schema,
    encoder: &FeatureEncoder,
) -> ExportDocument {
    let document = ExportDocument::new(inputs);
    match encoder.encode(inputs, schema) {
        Ok(vector) => document.with_encoded(schema, &vector),
        Err(_) => document,
    }
}
