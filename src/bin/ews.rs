//! EWS CLI - Command-line interface for Stress EWS
//!
//! Commands:
//! - predict: Validate, encode and classify one submission
//! - validate: Validate a submission without loading the model
//! - schema: Print the active feature schema
//! - template: Print a submission filled with form defaults
//! - doctor: Diagnose artifact locations and configuration

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stress_ews::export::{export_inputs, EXPORT_FILE_NAME};
use stress_ews::model::LogisticPipeline;
use stress_ews::schema::{FeatureKind, Schema, SchemaSource};
use stress_ews::{
    BoundsPolicy, EwsError, FeatureEncoder, Prediction, RawInputs, Settings, StressPredictor,
    ValidationErrors, EWS_VERSION, PRODUCER_NAME,
};

/// EWS - Early-warning classifier for academic stress
#[derive(Parser)]
#[command(name = "ews")]
#[command(version = EWS_VERSION)]
#[command(about = "Validate student survey answers and predict academic stress", long_about = None)]
struct Cli {
    /// Project root holding the models/ directory
    #[arg(long, global = true, env = "PROJECT_ROOT", default_value = ".")]
    project_root: PathBuf,

    /// Model artifact path (defaults to <root>/models/logistic_pipeline.json)
    #[arg(long, global = true, env = "EWS_MODEL_PATH")]
    model: Option<PathBuf>,

    /// Feature order file (defaults to <root>/models/feature_names.json)
    #[arg(long, global = true, env = "EWS_FEATURES_PATH")]
    features: Option<PathBuf>,

    /// Reject numeric values outside the form's bounds
    #[arg(long, global = true, env = "EWS_STRICT_BOUNDS", value_parser = clap::builder::BoolishValueParser::new())]
    strict_bounds: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, encode and classify one submission
    Predict {
        /// Input file with a JSON object of field values (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Also write the submitted inputs as a JSON export
        #[arg(long, num_args = 0..=1, default_missing_value = EXPORT_FILE_NAME)]
        export: Option<PathBuf>,

        /// Output the prediction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a submission without loading the model
    Validate {
        /// Input file with a JSON object of field values (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the active feature schema
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a submission filled with form defaults
    Template,

    /// Diagnose artifact locations and configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn settings(cli: &Cli) -> Settings {
    let mut settings = Settings::from_root(&cli.project_root);
    if let Some(model) = &cli.model {
        settings = settings.with_model_path(model);
    }
    if let Some(features) = &cli.features {
        settings = settings.with_features_path(Some(features.clone()));
    }
    if cli.strict_bounds {
        settings = settings.with_bounds_policy(BoundsPolicy::Enforce);
    }
    settings
}

fn run(cli: Cli) -> Result<(), EwsCliError> {
    let settings = settings(&cli);

    match cli.command {
        Commands::Predict { input, export, json } => {
            cmd_predict(&settings, &input, export.as_deref(), json)
        }
        Commands::Validate { input, json } => cmd_validate(&settings, &input, json),
        Commands::Schema { json } => cmd_schema(&settings, json),
        Commands::Template => cmd_template(&settings),
        Commands::Doctor { json } => cmd_doctor(&settings, json),
    }
}

fn read_inputs(input: &Path) -> Result<RawInputs, EwsCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    Ok(RawInputs::from_json(&input_data)?)
}

fn cmd_predict(
    settings: &Settings,
    input: &Path,
    export: Option<&Path>,
    json: bool,
) -> Result<(), EwsCliError> {
    let raw = read_inputs(input)?;
    let predictor = StressPredictor::load(settings)?;

    if let Some(export_path) = export {
        let document = export_inputs(&raw, predictor.schema(), predictor.encoder());
        fs::write(export_path, document.to_json()?)?;
    }

    let prediction = match predictor.submit(&raw) {
        Ok(prediction) => prediction,
        Err(EwsError::Validation(errors)) => {
            print_validation(predictor.schema(), &errors, json)?;
            return Err(EwsCliError::ValidationFailed(errors.len()));
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&PredictionReport::from(&prediction))?);
    } else {
        println!("Prediction:                {}", prediction.class_label());
        println!("Probability (High stress): {}", prediction.probability_display());
    }

    Ok(())
}

fn cmd_validate(settings: &Settings, input: &Path, json: bool) -> Result<(), EwsCliError> {
    let raw = read_inputs(input)?;
    let schema = Schema::load(settings.features_path());
    let encoder = FeatureEncoder::with_bounds(settings.bounds_policy);

    match encoder.encode(&raw, &schema) {
        Ok(vector) => {
            if json {
                let report = serde_json::json!({
                    "valid": true,
                    "columns": schema.ordered_names(),
                    "encoded": vector,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("All {} fields are valid", vector.len());
            }
            Ok(())
        }
        Err(errors) => {
            print_validation(&schema, &errors, json)?;
            Err(EwsCliError::ValidationFailed(errors.len()))
        }
    }
}

fn print_validation(schema: &Schema, errors: &ValidationErrors, json: bool) -> Result<(), EwsCliError> {
    if json {
        let report = serde_json::json!({ "valid": false, "errors": errors });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Validation Report");
    println!("=================");
    println!("Invalid fields: {}", errors.len());
    println!("\nErrors:");
    for spec in schema.features() {
        if let Some(message) = errors.get(&spec.name) {
            println!("  - {} ({}): {}", spec.label, spec.name, message);
        }
    }
    Ok(())
}

fn cmd_schema(settings: &Settings, json: bool) -> Result<(), EwsCliError> {
    let schema = Schema::load(settings.features_path());

    if json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    println!("Feature Schema ({} features)", schema.len());
    println!();
    for (position, spec) in schema.features().iter().enumerate() {
        match &spec.kind {
            FeatureKind::Categorical { choices } => {
                let displays: Vec<&str> = choices.iter().map(|c| c.display.as_str()).collect();
                println!("{:>2}. {} ({}): one of [{}]", position + 1, spec.label, spec.name, displays.join(", "));
            }
            FeatureKind::Numeric { min, max, default } => {
                println!(
                    "{:>2}. {} ({}): integer {}..={} (default {})",
                    position + 1,
                    spec.label,
                    spec.name,
                    min,
                    max,
                    default
                );
            }
        }
    }
    println!();
    println!("Source: {}", describe_source(schema.source()));
    Ok(())
}

fn cmd_template(settings: &Settings) -> Result<(), EwsCliError> {
    let schema = Schema::load(settings.features_path());
    println!("{}", serde_json::to_string_pretty(&schema.default_inputs())?);
    Ok(())
}

fn cmd_doctor(settings: &Settings, json: bool) -> Result<(), EwsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "ews_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("EWS version {}", EWS_VERSION),
    });

    // Feature order
    let schema = Schema::load(settings.features_path());
    checks.push(DoctorCheck {
        name: "feature_order".to_string(),
        status: if schema.is_fallback() {
            CheckStatus::Warning
        } else {
            CheckStatus::Ok
        },
        message: format!("{} ({} features)", describe_source(schema.source()), schema.len()),
    });

    // Model artifact
    let model_check = match LogisticPipeline::load(&settings.model_path) {
        Ok(model) => {
            let missing: Vec<&str> = model
                .feature_names()
                .into_iter()
                .filter(|name| schema.get(name).is_none())
                .collect();
            if missing.is_empty() {
                DoctorCheck {
                    name: "model".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Model loaded from {}", settings.model_path.display()),
                }
            } else {
                DoctorCheck {
                    name: "model".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Model expects columns the schema lacks: {}", missing.join(", ")),
                }
            }
        }
        Err(e) => DoctorCheck {
            name: "model".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    };
    checks.push(model_check);

    checks.push(DoctorCheck {
        name: "bounds".to_string(),
        status: CheckStatus::Ok,
        message: match settings.bounds_policy {
            BoundsPolicy::Advisory => "Numeric bounds are advisory".to_string(),
            BoundsPolicy::Enforce => "Numeric bounds are enforced".to_string(),
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: EWS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("EWS Doctor Report");
        println!("=================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(EwsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn describe_source(source: &SchemaSource) -> String {
    match source {
        SchemaSource::Builtin => "Built-in feature order".to_string(),
        SchemaSource::Sidecar { path } => format!("Feature order from {}", path.display()),
        SchemaSource::Fallback { path, reason } => {
            format!("Built-in feature order ({} rejected: {})", path.display(), reason)
        }
    }
}

// Error types

#[derive(Debug)]
enum EwsCliError {
    Io(io::Error),
    Ews(EwsError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for EwsCliError {
    fn from(e: io::Error) -> Self {
        EwsCliError::Io(e)
    }
}

impl From<EwsError> for EwsCliError {
    fn from(e: EwsError) -> Self {
        EwsCliError::Ews(e)
    }
}

impl From<serde_json::Error> for EwsCliError {
    fn from(e: serde_json::Error) -> Self {
        EwsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EwsCliError> for CliError {
    fn from(e: EwsCliError) -> Self {
        match e {
            EwsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EwsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EwsCliError::Ews(e @ EwsError::ModelLoad { .. }) => CliError {
                code: "MODEL_LOAD_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Set --project-root or --model to the trained pipeline".to_string()),
            },
            EwsCliError::Ews(e @ EwsError::Prediction(_)) => CliError {
                code: "PREDICTION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'ews doctor' to check the model against the schema".to_string()),
            },
            EwsCliError::Ews(e) => CliError {
                code: "INPUT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Input must be a JSON object of field values; see 'ews template'".to_string()),
            },
            EwsCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} fields failed validation", count),
                hint: Some("Fix the listed fields and retry".to_string()),
            },
            EwsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct PredictionReport {
    #[serde(flatten)]
    prediction: Prediction,
    class_label: &'static str,
    probability_display: String,
}

impl From<&Prediction> for PredictionReport {
    fn from(prediction: &Prediction) -> Self {
        Self {
            prediction: prediction.clone(),
            class_label: prediction.class_label(),
            probability_display: prediction.probability_display(),
        }
    }
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
