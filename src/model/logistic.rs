//! Logistic regression behind a column transformer
//!
//! The artifact is a JSON document: standard-scaled numeric columns,
//! one-hot categorical columns and a linear head. Columns are looked up in
//! the incoming frame by name, so the frame must carry the schema's
//! column labels.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::EwsError;
use crate::model::Classifier;
use crate::types::{EncodedValue, FeatureFrame};

/// Standard-scaled numeric input: `coef * (x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledColumn {
    pub name: String,
    #[serde(default)]
    pub mean: f64,
    #[serde(default = "unit_scale")]
    pub scale: f64,
    pub coef: f64,
}

/// Weight for one known category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeight {
    pub value: EncodedValue,
    pub coef: f64,
}

/// What to do with a category not seen at fit time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategory {
    #[default]
    Error,
    /// Contribute nothing (all-zero one-hot row)
    Ignore,
}

/// One-hot encoded categorical input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub name: String,
    pub categories: Vec<CategoryWeight>,
    #[serde(default)]
    pub handle_unknown: UnknownCategory,
}

/// Serialized logistic classification pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticPipeline {
    pub intercept: f64,
    /// Class 1 is predicted when `P(class 1) > threshold`
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub numeric: Vec<ScaledColumn>,
    #[serde(default)]
    pub categorical: Vec<OneHotColumn>,
}

fn unit_scale() -> f64 {
    1.0
}

fn default_threshold() -> f64 {
    0.5
}

impl LogisticPipeline {
    /// Load a model artifact from disk.
    ///
    /// Every failure is reported as [`EwsError::ModelLoad`] naming the path.
    pub fn load(path: &Path) -> Result<Self, EwsError> {
        let load_err = |reason: String| EwsError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let model: LogisticPipeline =
            serde_json::from_str(&content).map_err(|e| load_err(e.to_string()))?;
        model.check().map_err(load_err)?;

        debug!(
            path = %path.display(),
            numeric = model.numeric.len(),
            categorical = model.categorical.len(),
            "model loaded"
        );
        Ok(model)
    }

    /// Parse a model artifact from a JSON string
    pub fn from_json(json: &str) -> Result<Self, EwsError> {
        let model: LogisticPipeline = serde_json::from_str(json)?;
        model.check().map_err(EwsError::InvalidInput)?;
        Ok(model)
    }

    /// Input columns this model reads
    pub fn feature_names(&self) -> Vec<&str> {
        self.numeric
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.categorical.iter().map(|c| c.name.as_str()))
            .collect()
    }

    fn check(&self) -> Result<(), String> {
        if !self.intercept.is_finite() {
            return Err("intercept is not finite".to_string());
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold {} is outside [0, 1]", self.threshold));
        }
        for col in &self.numeric {
            if !col.scale.is_finite() || col.scale == 0.0 {
                return Err(format!("column {}: scale must be finite and non-zero", col.name));
            }
            if !col.mean.is_finite() || !col.coef.is_finite() {
                return Err(format!("column {}: non-finite weight", col.name));
            }
        }
        for col in &self.categorical {
            if col.categories.iter().any(|c| !c.coef.is_finite()) {
                return Err(format!("column {}: non-finite weight", col.name));
            }
        }
        Ok(())
    }

    /// Linear score for every row of the frame
    pub fn decision_function(&self, frame: &FeatureFrame) -> Result<Vec<f64>, EwsError> {
        let numeric_idx = self
            .numeric
            .iter()
            .map(|c| column(frame, &c.name))
            .collect::<Result<Vec<_>, _>>()?;
        let categorical_idx = self
            .categorical
            .iter()
            .map(|c| column(frame, &c.name))
            .collect::<Result<Vec<_>, _>>()?;

        frame
            .rows()
            .iter()
            .map(|row| {
                let mut z = self.intercept;

                for (col, &idx) in self.numeric.iter().zip(&numeric_idx) {
                    let x = match &row[idx] {
                        EncodedValue::Int(i) => *i as f64,
                        EncodedValue::Text(s) => {
                            return Err(EwsError::Prediction(format!(
                                "column {} expects a number, got {:?}",
                                col.name, s
                            )));
                        }
                    };
                    z += col.coef * (x - col.mean) / col.scale;
                }

                for (col, &idx) in self.categorical.iter().zip(&categorical_idx) {
                    let value = &row[idx];
                    match col.categories.iter().find(|c| &c.value == value) {
                        Some(category) => z += category.coef,
                        None if col.handle_unknown == UnknownCategory::Ignore => {}
                        None => {
                            return Err(EwsError::Prediction(format!(
                                "found unknown category {} in column {}",
                                value, col.name
                            )));
                        }
                    }
                }

                Ok(z)
            })
            .collect()
    }
}

impl Classifier for LogisticPipeline {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<u8>, EwsError> {
        Ok(self
            .predict_proba(frame)?
            .into_iter()
            .map(|[_, p1]| u8::from(p1 > self.threshold))
            .collect())
    }

    fn predict_proba(&self, frame: &FeatureFrame) -> Result<Vec<[f64; 2]>, EwsError> {
        Ok(self
            .decision_function(frame)?
            .into_iter()
            .map(|z| {
                let p1 = sigmoid(z);
                [1.0 - p1, p1]
            })
            .collect())
    }
}

fn column(frame: &FeatureFrame, name: &str) -> Result<usize, EwsError> {
    frame
        .column_index(name)
        .ok_or_else(|| EwsError::Prediction(format!("column {name} is missing from the input")))
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
