//! Schema registry
//!
//! Builds the active, ordered feature schema once at startup. The ordering
//! comes from an optional feature-order sidecar (a JSON array of names) when
//! that file is a clean superset of [`REQUIRED_FEATURES`]; anything else
//! degrades to the built-in order. Degrading is never an error, but it is
//! recorded on the schema and logged.

use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::schema::catalog::{FeatureSpec, REQUIRED_FEATURES};
use crate::types::RawInputs;

/// Why a sidecar ordering was not used
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    #[error("feature order file not found")]
    NotFound,

    #[error("feature order file unreadable: {0}")]
    Unreadable(String),

    #[error("feature order file is not a JSON array of names: {0}")]
    Malformed(String),

    #[error("feature order lists {0:?} more than once")]
    DuplicateFeature(String),

    #[error("feature order is missing required features: {0:?}")]
    MissingRequired(Vec<String>),
}

/// Where the active ordering came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SchemaSource {
    /// No sidecar was configured
    Builtin,
    /// The sidecar was accepted
    Sidecar { path: PathBuf },
    /// A sidecar was configured but rejected
    Fallback { path: PathBuf, reason: FallbackReason },
}

/// Ordered feature schema; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    features: Vec<FeatureSpec>,
    source: SchemaSource,
}

impl Default for Schema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Schema {
    /// Schema in [`REQUIRED_FEATURES`] order
    pub fn builtin() -> Self {
        Self::from_names(REQUIRED_FEATURES.iter().copied(), SchemaSource::Builtin)
    }

    /// Build the active schema, falling back to the built-in order on any
    /// sidecar problem.
    pub fn load(sidecar: Option<&Path>) -> Self {
        let Some(path) = sidecar else {
            debug!("no feature order file configured; using built-in order");
            return Self::builtin();
        };

        match read_order(path) {
            Ok(names) => {
                info!(
                    path = %path.display(),
                    features = names.len(),
                    "using feature order from sidecar"
                );
                Self::from_names(
                    names.iter().map(String::as_str),
                    SchemaSource::Sidecar {
                        path: path.to_path_buf(),
                    },
                )
            }
            Err(reason) => {
                warn!(
                    path = %path.display(),
                    %reason,
                    "feature order sidecar rejected; using built-in order"
                );
                let mut schema = Self::builtin();
                schema.source = SchemaSource::Fallback {
                    path: path.to_path_buf(),
                    reason,
                };
                schema
            }
        }
    }

    /// Check a parsed ordering against the required feature list
    pub fn check_order(names: &[String]) -> Result<(), FallbackReason> {
        let mut seen = HashSet::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(FallbackReason::DuplicateFeature(name.clone()));
            }
        }

        let missing: Vec<String> = REQUIRED_FEATURES
            .iter()
            .filter(|required| !seen.contains(*required))
            .map(|required| required.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FallbackReason::MissingRequired(missing));
        }

        Ok(())
    }

    fn from_names<'a>(names: impl Iterator<Item = &'a str>, source: SchemaSource) -> Self {
        Self {
            features: names.map(FeatureSpec::resolve).collect(),
            source,
        }
    }

    /// Spec for `name`. Names outside the schema resolve the same way as
    /// uncatalogued ones.
    pub fn spec_for(&self, name: &str) -> FeatureSpec {
        self.get(name)
            .cloned()
            .unwrap_or_else(|| FeatureSpec::resolve(name))
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Column order the classifier expects
    pub fn ordered_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, SchemaSource::Fallback { .. })
    }

    /// A complete set of form defaults, as a cleared form would submit
    pub fn default_inputs(&self) -> RawInputs {
        self.features
            .iter()
            .map(|f| (f.name.clone(), f.default_input()))
            .collect()
    }
}

fn read_order(path: &Path) -> Result<Vec<String>, FallbackReason> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FallbackReason::NotFound,
        _ => FallbackReason::Unreadable(e.to_string()),
    })?;

    let names: Vec<String> =
        serde_json::from_str(&content).map_err(|e| FallbackReason::Malformed(e.to_string()))?;

    Schema::check_order(&names)?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::catalog::FeatureKind;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sidecar(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn required_json_without(skip: &str) -> String {
        let names: Vec<&str> = REQUIRED_FEATURES
            .iter()
            .copied()
            .filter(|n| *n != skip)
            .collect();
        serde_json::to_string(&names).unwrap()
    }

    #[test]
    fn test_builtin_order_matches_required() {
        let schema = Schema::builtin();
        assert_eq!(schema.ordered_names(), REQUIRED_FEATURES.to_vec());
        assert_eq!(schema.source(), &SchemaSource::Builtin);
    }

    #[test]
    fn test_no_sidecar_uses_required_order() {
        let schema = Schema::load(None);
        assert_eq!(schema.ordered_names(), REQUIRED_FEATURES.to_vec());
        assert!(!schema.is_fallback());
    }

    #[test]
    fn test_sidecar_reordering_is_honored() {
        let mut names: Vec<&str> = REQUIRED_FEATURES.to_vec();
        names.reverse();
        let file = sidecar(&serde_json::to_string(&names).unwrap());

        let schema = Schema::load(Some(file.path()));

        assert_eq!(schema.ordered_names(), names);
        assert_eq!(
            schema.source(),
            &SchemaSource::Sidecar {
                path: file.path().to_path_buf()
            }
        );
    }

    #[test]
    fn test_sidecar_superset_keeps_extra_features() {
        let mut names: Vec<&str> = REQUIRED_FEATURES.to_vec();
        names.push("G3");
        let file = sidecar(&serde_json::to_string(&names).unwrap());

        let schema = Schema::load(Some(file.path()));

        assert_eq!(schema.len(), 33);
        let g3 = schema.get("G3").unwrap();
        assert_eq!(g3.label, "G3");
        assert!(matches!(g3.kind, FeatureKind::Numeric { .. }));
    }

    #[test]
    fn test_sidecar_missing_required_falls_back() {
        let file = sidecar(&required_json_without("G2"));

        let schema = Schema::load(Some(file.path()));

        assert_eq!(schema.ordered_names(), REQUIRED_FEATURES.to_vec());
        assert_eq!(
            schema.source(),
            &SchemaSource::Fallback {
                path: file.path().to_path_buf(),
                reason: FallbackReason::MissingRequired(vec!["G2".to_string()]),
            }
        );
    }

    #[test]
    fn test_missing_sidecar_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature_names.json");

        let schema = Schema::load(Some(&path));

        assert_eq!(schema.ordered_names(), REQUIRED_FEATURES.to_vec());
        assert_eq!(
            schema.source(),
            &SchemaSource::Fallback {
                path,
                reason: FallbackReason::NotFound
            }
        );
    }

    #[test]
    fn test_malformed_sidecar_falls_back() {
        for content in ["not json", r#"{"order": []}"#, "[1, 2, 3]", ""] {
            let file = sidecar(content);
            let schema = Schema::load(Some(file.path()));

            assert_eq!(schema.ordered_names(), REQUIRED_FEATURES.to_vec());
            assert!(matches!(
                schema.source(),
                SchemaSource::Fallback {
                    reason: FallbackReason::Malformed(_),
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_duplicate_names_fall_back() {
        let mut names: Vec<&str> = REQUIRED_FEATURES.to_vec();
        names.push("age");
        let file = sidecar(&serde_json::to_string(&names).unwrap());

        let schema = Schema::load(Some(file.path()));

        assert!(schema.is_fallback());
        assert_eq!(schema.len(), REQUIRED_FEATURES.len());
    }

    #[test]
    fn test_spec_for_is_total() {
        let schema = Schema::builtin();
        assert_eq!(schema.spec_for("sex").label, "Sex");
        assert_eq!(schema.spec_for("not_a_feature").label, "not_a_feature");
    }

    #[test]
    fn test_default_inputs_cover_schema() {
        let schema = Schema::builtin();
        let defaults = schema.default_inputs();
        assert_eq!(defaults.len(), schema.len());
        for name in schema.ordered_names() {
            assert!(defaults.get(name).is_some());
        }
    }

    #[test]
    fn test_fallback_source_serializes() {
        let source = SchemaSource::Fallback {
            path: PathBuf::from("models/feature_names.json"),
            reason: FallbackReason::MissingRequired(vec!["G2".to_string()]),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["reason"]["kind"], "missing_required");
        assert_eq!(json["reason"]["detail"][0], "G2");
    }
}
