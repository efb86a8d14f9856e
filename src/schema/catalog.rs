//! Built-in feature catalog
//!
//! Labels, dropdown choices and numeric bounds for every feature the
//! stress classifier was trained on. Display strings are what the form
//! shows; encoded values are what the model saw at training time and must
//! be reproduced exactly, including letter case.

use serde::Serialize;

use crate::types::{EncodedValue, RawValue};

/// Column order the bundled classifier was fitted on
pub const REQUIRED_FEATURES: [&str; 32] = [
    "school", "sex", "age", "address", "famsize", "Pstatus", "Medu", "Fedu",
    "Mjob", "Fjob", "reason", "guardian", "traveltime", "studytime", "failures",
    "schoolsup", "famsup", "paid", "activities", "nursery", "higher", "internet",
    "romantic", "famrel", "freetime", "goout", "Dalc", "Walc", "health", "absences",
    "G1", "G2",
];

/// One dropdown entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub display: String,
    pub encoded: EncodedValue,
}

/// How a feature is entered and encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Closed set of display values, each mapped to its encoded value
    Categorical { choices: Vec<Choice> },
    /// Integer input with inclusive bounds
    Numeric { min: i64, max: i64, default: i64 },
}

/// Per-feature metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSpec {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

impl FeatureSpec {
    /// Resolve a feature name against the catalog.
    ///
    /// Names the catalog does not know get an identity label and an
    /// unbounded numeric kind.
    pub fn resolve(name: &str) -> FeatureSpec {
        builtin(name).unwrap_or_else(|| FeatureSpec::identity(name))
    }

    /// Fallback spec for a feature without catalog metadata
    pub fn identity(name: &str) -> FeatureSpec {
        FeatureSpec {
            name: name.to_string(),
            label: name.to_string(),
            kind: FeatureKind::Numeric {
                min: i64::MIN,
                max: i64::MAX,
                default: 0,
            },
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FeatureKind::Categorical { .. })
    }

    /// Encoded value for a dropdown display string (exact match)
    pub fn lookup(&self, display: &str) -> Option<&EncodedValue> {
        match &self.kind {
            FeatureKind::Categorical { choices } => choices
                .iter()
                .find(|c| c.display == display)
                .map(|c| &c.encoded),
            FeatureKind::Numeric { .. } => None,
        }
    }

    /// What a freshly cleared form shows for this field
    pub fn default_input(&self) -> RawValue {
        match &self.kind {
            FeatureKind::Categorical { choices } => choices
                .first()
                .map(|c| RawValue::Text(c.display.clone()))
                .unwrap_or_else(|| RawValue::Text(String::new())),
            FeatureKind::Numeric { default, .. } => RawValue::Integer(*default),
        }
    }
}

/// Catalog entry for `name`, if the catalog knows it
pub fn builtin(name: &str) -> Option<FeatureSpec> {
    let (label, kind) = match name {
        "school" => ("School", identity_choices(&["GP", "MS"])),
        "sex" => ("Sex", identity_choices(&["F", "M"])),
        "age" => ("Age", numeric(10, 30, 17)),
        "address" => ("Address", text_choices(&[("U (urban)", "U"), ("R (rural)", "R")])),
        "famsize" => (
            "Family Size",
            text_choices(&[("GT3 (>=3)", "GT3"), ("LE3 (<3)", "LE3")]),
        ),
        "Pstatus" => (
            "Parent Cohabitation",
            text_choices(&[("T (together)", "T"), ("A (apart)", "A")]),
        ),
        "Medu" => ("Mother's Education", education()),
        "Fedu" => ("Father's Education", education()),
        "Mjob" => ("Mother's Job", jobs()),
        "Fjob" => ("Father's Job", jobs()),
        "reason" => (
            "Reason for School Choice",
            identity_choices(&["home", "reputation", "course", "other"]),
        ),
        "guardian" => ("Guardian", identity_choices(&["mother", "father", "other"])),
        "traveltime" => (
            "Travel Time",
            int_choices(&[
                ("1 - <15 min", 1),
                ("2 - 15–30 min", 2),
                ("3 - 30–60 min", 3),
                ("4 - >60 min", 4),
            ]),
        ),
        "studytime" => (
            "Weekly Study Time",
            int_choices(&[
                ("1 - <2 hrs", 1),
                ("2 - 2–5 hrs", 2),
                ("3 - 5–10 hrs", 3),
                ("4 - >10 hrs", 4),
            ]),
        ),
        "failures" => (
            "Past Failures",
            int_choices(&[("0", 0), ("1", 1), ("2", 2), ("3", 3)]),
        ),
        "schoolsup" => ("School Support", yes_no()),
        "famsup" => ("Family Support", yes_no()),
        "paid" => ("Paid Classes", yes_no()),
        "activities" => ("Activities", yes_no()),
        "nursery" => ("Nursery", yes_no()),
        "higher" => ("Wants Higher Edu", yes_no()),
        "internet" => ("Internet", yes_no()),
        "romantic" => ("Romantic", yes_no()),
        "famrel" => ("Family Relationship", one_to_five()),
        "freetime" => ("Free Time", one_to_five()),
        "goout" => ("Going Out", one_to_five()),
        "Dalc" => ("Workday Alcohol", one_to_five()),
        "Walc" => ("Weekend Alcohol", one_to_five()),
        "health" => ("Health", one_to_five()),
        "absences" => ("Absences", numeric(0, 93, 0)),
        "G1" => ("G1 (0–20)", numeric(0, 20, 10)),
        "G2" => ("G2 (0–20)", numeric(0, 20, 10)),
        _ => return None,
    };

    Some(FeatureSpec {
        name: name.to_string(),
        label: label.to_string(),
        kind,
    })
}

fn numeric(min: i64, max: i64, default: i64) -> FeatureKind {
    FeatureKind::Numeric { min, max, default }
}

fn identity_choices(values: &[&str]) -> FeatureKind {
    FeatureKind::Categorical {
        choices: values
            .iter()
            .map(|v| Choice {
                display: v.to_string(),
                encoded: EncodedValue::Text(v.to_string()),
            })
            .collect(),
    }
}

fn text_choices(pairs: &[(&str, &str)]) -> FeatureKind {
    FeatureKind::Categorical {
        choices: pairs
            .iter()
            .map(|(display, encoded)| Choice {
                display: display.to_string(),
                encoded: EncodedValue::Text(encoded.to_string()),
            })
            .collect(),
    }
}

fn int_choices(pairs: &[(&str, i64)]) -> FeatureKind {
    FeatureKind::Categorical {
        choices: pairs
            .iter()
            .map(|(display, encoded)| Choice {
                display: display.to_string(),
                encoded: EncodedValue::Int(*encoded),
            })
            .collect(),
    }
}

fn education() -> FeatureKind {
    int_choices(&[
        ("0 - None", 0),
        ("1 - Primary", 1),
        ("2 - 5th–9th", 2),
        ("3 - Secondary", 3),
        ("4 - Higher", 4),
    ])
}

fn jobs() -> FeatureKind {
    identity_choices(&["teacher", "health", "services", "at_home", "other"])
}

// "yes" is listed first so a cleared form defaults to it
fn yes_no() -> FeatureKind {
    int_choices(&[("yes", 1), ("no", 0)])
}

fn one_to_five() -> FeatureKind {
    int_choices(&[("1", 1), ("2", 2), ("3", 3), ("4", 4), ("5", 5)])
}
