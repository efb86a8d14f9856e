//! Artifact locations and pipeline settings
//!
//! Paths resolve from a project root:
//! - model: `<root>/models/logistic_pipeline.json`
//! - feature order sidecar: `<root>/models/feature_names.json`
//!
//! Environment overrides:
//! - `PROJECT_ROOT`: project root (default `.`)
//! - `EWS_MODEL_PATH`: model artifact path
//! - `EWS_FEATURES_PATH`: feature order sidecar path
//! - `EWS_STRICT_BOUNDS`: enforce numeric bounds (`1`, `true`, `yes`, `on`)

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::encoder::BoundsPolicy;

pub const PROJECT_ROOT_ENV: &str = "PROJECT_ROOT";
pub const MODEL_PATH_ENV: &str = "EWS_MODEL_PATH";
pub const FEATURES_PATH_ENV: &str = "EWS_FEATURES_PATH";
pub const STRICT_BOUNDS_ENV: &str = "EWS_STRICT_BOUNDS";

pub const MODELS_DIR: &str = "models";
pub const MODEL_FILE: &str = "logistic_pipeline.json";
pub const FEATURES_FILE: &str = "feature_names.json";

/// Where artifacts live and how inputs are validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub project_root: PathBuf,
    pub model_path: PathBuf,
    /// `None` skips the sidecar and uses the built-in feature order
    pub features_path: Option<PathBuf>,
    #[serde(default)]
    pub bounds_policy: BoundsPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_root(default_project_root())
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

impl Settings {
    /// Settings with every artifact under `root/models`
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let project_root = root.into();
        let models = project_root.join(MODELS_DIR);
        Self {
            model_path: models.join(MODEL_FILE),
            features_path: Some(models.join(FEATURES_FILE)),
            project_root,
            bounds_policy: BoundsPolicy::default(),
        }
    }

    /// Settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Settings from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let root = non_empty(PROJECT_ROOT_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_project_root);
        let mut settings = Self::from_root(root);

        if let Some(model) = non_empty(MODEL_PATH_ENV) {
            settings.model_path = PathBuf::from(model);
        }
        if let Some(features) = non_empty(FEATURES_PATH_ENV) {
            settings.features_path = Some(PathBuf::from(features));
        }
        if non_empty(STRICT_BOUNDS_ENV).is_some_and(|v| is_truthy(&v)) {
            settings.bounds_policy = BoundsPolicy::Enforce;
        }

        settings
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_features_path(mut self, path: Option<PathBuf>) -> Self {
        self.features_path = path;
        self
    }

    pub fn with_bounds_policy(mut self, policy: BoundsPolicy) -> Self {
        self.bounds_policy = policy;
        self
    }

    pub fn features_path(&self) -> Option<&Path> {
        self.features_path.as_deref()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
