//! Prediction pipeline
//!
//! This module provides the public API for the early-warning classifier.
//! A [`StressPredictor`] is built once at startup and then serves one
//! validate → encode → predict cycle per form submission.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::encoder::FeatureEncoder;
use crate::error::EwsError;
use crate::model::{Classifier, LogisticPipeline};
use crate::schema::Schema;
use crate::types::{EncodedVector, FeatureFrame, RawInputs};

/// Predicted stress class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StressClass {
    Low,
    High,
}

impl StressClass {
    /// Map a classifier label; only `1` means high stress
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            StressClass::High
        } else {
            StressClass::Low
        }
    }

    pub fn label(&self) -> u8 {
        match self {
            StressClass::Low => 0,
            StressClass::High => 1,
        }
    }
}

/// Outcome of one successful submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class: StressClass,
    /// Probability of high stress, when the classifier could provide it
    pub probability: Option<f64>,
}

impl Prediction {
    pub fn class_label(&self) -> &'static str {
        match self.class {
            StressClass::High => "1 (High stress)",
            StressClass::Low => "0 (Low stress)",
        }
    }

    pub fn probability_display(&self) -> String {
        match self.probability {
            Some(p) => format!("{p:.4}"),
            None => "N/A".to_string(),
        }
    }
}

/// Immutable prediction context: schema, encoder and classifier
pub struct StressPredictor {
    schema: Schema,
    encoder: FeatureEncoder,
    model: Box<dyn Classifier>,
}

impl StressPredictor {
    /// Create a predictor from already-loaded parts
    pub fn new(schema: Schema, model: Box<dyn Classifier>) -> Self {
        Self {
            schema,
            encoder: FeatureEncoder::new(),
            model,
        }
    }

    /// Replace the encoder (e.g. to enforce numeric bounds)
    pub fn with_encoder(mut self, encoder: FeatureEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Load schema and model from the configured locations.
    ///
    /// Schema problems fall back silently; a model that cannot be loaded is
    /// fatal.
    pub fn load(settings: &Settings) -> Result<Self, EwsError> {
        let schema = Schema::load(settings.features_path());
        let model = LogisticPipeline::load(&settings.model_path)?;
        Ok(Self::new(schema, Box::new(model))
            .with_encoder(FeatureEncoder::with_bounds(settings.bounds_policy)))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Validate and encode without calling the model
    pub fn encode(&self, raw: &RawInputs) -> Result<EncodedVector, EwsError> {
        Ok(self.encoder.encode(raw, &self.schema)?)
    }

    /// Run one full submission.
    ///
    /// Field problems come back as [`EwsError::Validation`] with every
    /// failing field; the model is not called in that case.
    pub fn submit(&self, raw: &RawInputs) -> Result<Prediction, EwsError> {
        let vector = self.encode(raw)?;
        self.predict_encoded(&vector)
    }

    /// Classify an already-encoded vector
    pub fn predict_encoded(&self, vector: &EncodedVector) -> Result<Prediction, EwsError> {
        let frame = self.frame(vector)?;

        let probability = match self.model.predict_proba(&frame) {
            Ok(rows) => rows.first().map(|[_, p1]| *p1),
            Err(e) => {
                warn!(error = %e, "probability unavailable; continuing with class label only");
                None
            }
        };

        let labels = self.model.predict(&frame).map_err(|e| match e {
            EwsError::Prediction(_) => e,
            other => EwsError::Prediction(other.to_string()),
        })?;
        let label = labels
            .first()
            .copied()
            .ok_or_else(|| EwsError::Prediction("classifier returned no labels".to_string()))?;

        let prediction = Prediction {
            class: StressClass::from_label(label),
            probability,
        };
        debug!(class = ?prediction.class, probability = ?prediction.probability, "prediction");
        Ok(prediction)
    }

    fn frame(&self, vector: &EncodedVector) -> Result<FeatureFrame, EwsError> {
        let columns = self
            .schema
            .ordered_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        FeatureFrame::single_row(columns, vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{BoundsPolicy, ENTER_A_NUMBER};
    use crate::types::EncodedValue;
    use std::cell::RefCell;
    use std::io::Write;

    /// Classifier that records the frames it was given
    struct RecordingClassifier {
        label: u8,
        proba: Option<f64>,
        frames: RefCell<Vec<FeatureFrame>>,
    }

    impl RecordingClassifier {
        fn new(label: u8, proba: Option<f64>) -> Self {
            Self {
                label,
                proba,
                frames: RefCell::new(Vec::new()),
            }
        }
    }

    impl Classifier for std::rc::Rc<RecordingClassifier> {
        fn predict(&self, frame: &FeatureFrame) -> Result<Vec<u8>, EwsError> {
            self.frames.borrow_mut().push(frame.clone());
            Ok(vec![self.label])
        }

        fn predict_proba(&self, _frame: &FeatureFrame) -> Result<Vec<[f64; 2]>, EwsError> {
            match self.proba {
                Some(p) => Ok(vec![[1.0 - p, p]]),
                None => Err(EwsError::Prediction("predict_proba exploded".to_string())),
            }
        }
    }

    struct LabelOnly;

    impl Classifier for LabelOnly {
        fn predict(&self, _frame: &FeatureFrame) -> Result<Vec<u8>, EwsError> {
            Ok(vec![0])
        }
    }

    struct Broken;

    impl Classifier for Broken {
        fn predict(&self, _frame: &FeatureFrame) -> Result<Vec<u8>, EwsError> {
            Err(EwsError::InvalidInput("shape mismatch".to_string()))
        }
    }

    fn predictor(model: impl Classifier + 'static) -> StressPredictor {
        StressPredictor::new(Schema::builtin(), Box::new(model))
    }

    #[test]
    fn test_submit_passes_named_columns() {
        let recorder = std::rc::Rc::new(RecordingClassifier::new(1, Some(0.8312)));
        let predictor = predictor(recorder.clone());
        let raw = predictor.schema().default_inputs();

        let prediction = predictor.submit(&raw).unwrap();

        assert_eq!(prediction.class, StressClass::High);
        assert_eq!(prediction.class_label(), "1 (High stress)");
        assert_eq!(prediction.probability_display(), "0.8312");

        let frames = recorder.frames.borrow();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].columns().len(), 32);
        assert_eq!(frames[0].columns()[0], "school");
        assert_eq!(frames[0].rows()[0][0], EncodedValue::from("GP"));
    }

    #[test]
    fn test_validation_failure_skips_model() {
        let recorder = std::rc::Rc::new(RecordingClassifier::new(1, Some(0.5)));
        let predictor = predictor(recorder.clone());
        let mut raw = predictor.schema().default_inputs();
        raw.insert("age", "abc");

        let err = predictor.submit(&raw).unwrap_err();

        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("age"), Some(ENTER_A_NUMBER));
        assert!(recorder.frames.borrow().is_empty());
    }

    #[test]
    fn test_probability_failure_degrades() {
        let recorder = std::rc::Rc::new(RecordingClassifier::new(0, None));
        let predictor = predictor(recorder);

        let prediction = predictor.submit(&predictor.schema().default_inputs()).unwrap();

        assert_eq!(prediction.class, StressClass::Low);
        assert_eq!(prediction.probability, None);
        assert_eq!(prediction.probability_display(), "N/A");
        assert_eq!(prediction.class_label(), "0 (Low stress)");
    }

    #[test]
    fn test_classifier_without_probabilities() {
        let predictor = predictor(LabelOnly);
        let prediction = predictor.submit(&predictor.schema().default_inputs()).unwrap();
        assert_eq!(prediction.probability, None);
    }

    #[test]
    fn test_predict_failure_is_reported() {
        let predictor = predictor(Broken);
        let err = predictor
            .submit(&predictor.schema().default_inputs())
            .unwrap_err();
        assert!(matches!(err, EwsError::Prediction(ref msg) if msg.contains("shape mismatch")));
    }

    #[test]
    fn test_non_one_labels_are_low() {
        assert_eq!(StressClass::from_label(0), StressClass::Low);
        assert_eq!(StressClass::from_label(2), StressClass::Low);
        assert_eq!(StressClass::from_label(1), StressClass::High);
    }

    #[test]
    fn test_load_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        std::fs::create_dir_all(&models).unwrap();
        let mut file = std::fs::File::create(models.join("logistic_pipeline.json")).unwrap();
        file.write_all(
            br#"{"intercept": -1.0, "numeric": [{"name": "failures", "coef": 2.0}]}"#,
        )
        .unwrap();

        let settings = Settings::from_root(dir.path()).with_bounds_policy(BoundsPolicy::Enforce);
        let predictor = StressPredictor::load(&settings).unwrap();

        // no sidecar on disk: built-in order, recorded as a fallback
        assert!(predictor.schema().is_fallback());
        assert_eq!(predictor.encoder().bounds(), BoundsPolicy::Enforce);

        let raw = predictor.schema().default_inputs().with("failures", "3");
        let prediction = predictor.submit(&raw).unwrap();
        assert_eq!(prediction.class, StressClass::High);
        assert!(prediction.probability.unwrap() > 0.99);
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_root(dir.path());

        let err = StressPredictor::load(&settings).err().unwrap();
        assert!(matches!(err, EwsError::ModelLoad { .. }));
        assert!(err.to_string().contains("logistic_pipeline.json"));
    }
}
