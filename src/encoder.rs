//! Feature encoding and validation
//!
//! Turns one snapshot of raw form inputs into either a complete,
//! schema-ordered [`EncodedVector`] or the full set of field errors.
//! Every field is checked before deciding, so a single pass reports all
//! failing fields. Encoding is a pure function of the inputs and schema.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::{FeatureKind, FeatureSpec, Schema};
use crate::types::{EncodedValue, EncodedVector, RawInputs, RawValue, ValidationErrors};

/// Message for a missing or unrecognised dropdown value
pub const CHOOSE_VALID_OPTION: &str = "Choose a valid option";

/// Message for a numeric field that does not parse
pub const ENTER_A_NUMBER: &str = "Enter a number";

/// Whether numeric bounds are checked during validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Bounds only constrain the input control; any integer is accepted
    #[default]
    Advisory,
    /// Out-of-range integers are rejected
    Enforce,
}

/// Encoder for producing model-ready feature vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder {
    bounds: BoundsPolicy,
}

impl FeatureEncoder {
    /// Create an encoder with advisory bounds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder with a specific bounds policy
    pub fn with_bounds(bounds: BoundsPolicy) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> BoundsPolicy {
        self.bounds
    }

    /// Encode raw inputs in schema order.
    ///
    /// Inputs for names outside the schema are ignored.
    pub fn encode(
        &self,
        raw: &RawInputs,
        schema: &Schema,
    ) -> Result<EncodedVector, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut values = Vec::with_capacity(schema.len());

        for spec in schema.features() {
            match self.encode_field(spec, raw.get(&spec.name)) {
                Ok(value) => values.push(value),
                Err(message) => errors.insert(&spec.name, message),
            }
        }

        if !errors.is_empty() {
            debug!(failed = errors.len(), total = schema.len(), "inputs rejected");
            return Err(errors);
        }

        debug!(features = values.len(), "inputs encoded");
        Ok(EncodedVector::new(values))
    }

    /// Encode a single field
    pub fn encode_field(
        &self,
        spec: &FeatureSpec,
        raw: Option<&RawValue>,
    ) -> Result<EncodedValue, String> {
        match &spec.kind {
            FeatureKind::Categorical { .. } => raw
                .and_then(|value| spec.lookup(&value.as_display()))
                .cloned()
                .ok_or_else(|| CHOOSE_VALID_OPTION.to_string()),
            FeatureKind::Numeric { min, max, .. } => {
                let parsed = raw.and_then(cast_int).ok_or_else(|| ENTER_A_NUMBER.to_string())?;
                if self.bounds == BoundsPolicy::Enforce && !(*min..=*max).contains(&parsed) {
                    return Err(format!("Enter a value between {min} and {max}"));
                }
                Ok(EncodedValue::Int(parsed))
            }
        }
    }
}

/// Encode with the default (advisory) bounds policy
pub fn encode(raw: &RawInputs, schema: &Schema) -> Result<EncodedVector, ValidationErrors> {
    FeatureEncoder::new().encode(raw, schema)
}

/// Interpret a raw value as an integer: parse as a float, then truncate
/// toward zero. Non-finite or out-of-range values do not cast.
pub fn cast_int(raw: &RawValue) -> Option<i64> {
    let value = match raw {
        RawValue::Integer(i) => return Some(*i),
        RawValue::Float(f) => *f,
        RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
    };

    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    // i64::MAX is not representable as f64; 2^63 is the first value past it
    if truncated < i64::MIN as f64 || truncated >= 9_223_372_036_854_775_808.0 {
        return None;
    }
    Some(truncated as i64)
}
