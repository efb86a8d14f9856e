//! Stress EWS - feature encoding and validation for an academic-stress classifier
//!
//! Survey-style answers about a student are validated against a fixed
//! feature schema and encoded into the exact column order and value
//! representation a pre-trained binary classifier expects:
//! raw form inputs → schema validation → encoded vector → prediction.
//!
//! ## Modules
//!
//! - **Schema**: the ordered feature catalog, with an optional feature-order sidecar
//! - **Encoder**: pure validation and encoding of one submission
//! - **Pipeline**: the startup context that ties schema, encoder and model together

pub mod config;
pub mod encoder;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::Settings;
pub use encoder::{encode, BoundsPolicy, FeatureEncoder};
pub use error::EwsError;
pub use model::{Classifier, LogisticPipeline};
pub use pipeline::{Prediction, StressClass, StressPredictor};
pub use schema::{FeatureKind, FeatureSpec, Schema, REQUIRED_FEATURES};
pub use types::{EncodedValue, EncodedVector, RawInputs, RawValue, ValidationErrors};

/// Library version embedded in exports and diagnostics
pub const EWS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported documents
pub const PRODUCER_NAME: &str = "stress-ews";
