//! Classifier collaborator
//!
//! The pipeline treats the model as an opaque, pre-fitted binary classifier
//! reached through [`Classifier`]. [`LogisticPipeline`] is the artifact
//! format shipped with the application.

mod logistic;

pub use logistic::*;

use crate::error::EwsError;
use crate::types::FeatureFrame;

/// A fitted binary classifier
pub trait Classifier {
    /// Class label (0 or 1) for each row
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<u8>, EwsError>;

    /// `[P(class 0), P(class 1)]` for each row.
    ///
    /// Classifiers without probability support keep the default.
    fn predict_proba(&self, _frame: &FeatureFrame) -> Result<Vec<[f64; 2]>, EwsError> {
        Err(EwsError::ProbabilityUnavailable(
            "classifier does not expose probabilities".to_string(),
        ))
    }
}
