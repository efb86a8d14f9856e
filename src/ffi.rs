//! FFI bindings for Stress EWS
//!
//! This module provides C-compatible functions so a presentation layer
//! written in another language can render the form, validate submissions
//! and request predictions. All functions use C strings (null-terminated)
//! and return allocated memory that must be freed by the caller using
//! `ews_free_string`.
//!
//! Field validation failures are not FFI errors: they come back as JSON
//! with `"status": "invalid"` and a field-keyed `errors` object.

use serde::Serialize;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::Settings;
use crate::encoder;
use crate::error::EwsError;
use crate::export::export_inputs;
use crate::pipeline::{Prediction, StressPredictor};
use crate::schema::Schema;
use crate::types::{EncodedVector, RawInputs, ValidationErrors};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize a response, or record the error and return NULL
fn respond<T: Serialize>(result: Result<T, EwsError>) -> *mut c_char {
    match result.and_then(|value| serde_json::to_string(&value).map_err(EwsError::from)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum EncodeResponse<'a> {
    Valid {
        columns: Vec<&'a str>,
        encoded: EncodedVector,
    },
    Invalid {
        errors: ValidationErrors,
    },
}

impl<'a> EncodeResponse<'a> {
    fn from_result(schema: &'a Schema, result: Result<EncodedVector, ValidationErrors>) -> Self {
        match result {
            Ok(encoded) => EncodeResponse::Valid {
                columns: schema.ordered_names(),
                encoded,
            },
            Err(errors) => EncodeResponse::Invalid { errors },
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum SubmitResponse {
    Predicted {
        #[serde(flatten)]
        prediction: Prediction,
        class_label: &'static str,
        probability_display: String,
    },
    Invalid {
        errors: ValidationErrors,
    },
}

fn parse_inputs(json: *const c_char) -> Result<RawInputs, EwsError> {
    let json = unsafe { cstr_to_string(json) }
        .ok_or_else(|| EwsError::InvalidInput("Invalid inputs string pointer".to_string()))?;
    RawInputs::from_json(&json)
}

// ============================================================================
// Stateless API
// ============================================================================

/// Validate and encode inputs against the built-in schema.
///
/// # Safety
/// - `inputs_json` must be a valid null-terminated C string holding a JSON object.
/// - Returns a newly allocated string that must be freed with `ews_free_string`.
/// - Returns NULL on error; call `ews_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ews_encode(inputs_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let schema = Schema::builtin();
    respond(parse_inputs(inputs_json).map(|raw| {
        EncodeResponse::from_result(&schema, encoder::encode(&raw, &schema))
    }))
}

// ============================================================================
// Predictor API
// ============================================================================

/// Opaque handle to a StressPredictor
pub struct EwsPredictorHandle {
    predictor: StressPredictor,
}

/// Load a predictor from a project root.
///
/// # Safety
/// - `project_root` must be a valid null-terminated C string, or NULL to
///   read the locations from the environment.
/// - Returns a pointer that must be freed with `ews_predictor_free`.
/// - Returns NULL if the model cannot be loaded; call `ews_last_error`.
#[no_mangle]
pub unsafe extern "C" fn ews_predictor_new(project_root: *const c_char) -> *mut EwsPredictorHandle {
    clear_last_error();

    let settings = match cstr_to_string(project_root) {
        Some(root) => Settings::from_root(root),
        None => Settings::from_env(),
    };

    match StressPredictor::load(&settings) {
        Ok(predictor) => Box::into_raw(Box::new(EwsPredictorHandle { predictor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a predictor.
///
/// # Safety
/// - `predictor` must be a valid pointer returned by `ews_predictor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn ews_predictor_free(predictor: *mut EwsPredictorHandle) {
    if !predictor.is_null() {
        drop(Box::from_raw(predictor));
    }
}

/// Describe the active schema (names, labels, choices, bounds, source).
///
/// # Safety
/// - `predictor` must be a valid pointer returned by `ews_predictor_new`.
/// - Returns a newly allocated string that must be freed with `ews_free_string`.
/// - Returns NULL on error; call `ews_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ews_predictor_schema(predictor: *const EwsPredictorHandle) -> *mut c_char {
    clear_last_error();

    if predictor.is_null() {
        set_last_error("Null predictor pointer");
        return ptr::null_mut();
    }

    let handle = &*predictor;
    respond(Ok(handle.predictor.schema()))
}

/// Default inputs for a cleared form.
///
/// # Safety
/// - `predictor` must be a valid pointer returned by `ews_predictor_new`.
/// - Returns a newly allocated string that must be freed with `ews_free_string`.
/// - Returns NULL on error; call `ews_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ews_predictor_defaults(predictor: *const EwsPredictorHandle) -> *mut c_char {
    clear_last_error();

    if predictor.is_null() {
        set_last_error("Null predictor pointer");
        return ptr::null_mut();
    }

    let handle = &*predictor;
    respond(Ok(handle.predictor.schema().default_inputs()))
}

/// Validate and encode inputs without calling the model.
///
/// # Safety
/// - `predictor` must be a valid pointer returned by `ews_predictor_new`.
/// - `inputs_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `ews_free_string`.
/// - Returns NULL on error; call `ews_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ews_predictor_validate(
    predictor: *const EwsPredictorHandle,
    inputs_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if predictor.is_null() {
        set_last_error("Null predictor pointer");
        return ptr::null_mut();
    }

    let handle = &*predictor;
    let schema = handle.predictor.schema();
    let encoder = handle.predictor.encoder();
    respond(parse_inputs(inputs_json).map(|raw| {
        EncodeResponse::from_result(schema, encoder.encode(&raw, schema))
    }))
}

/// Validate, encode and classify one submission.
///
/// # Safety
/// - `predictor` must be a valid pointer returned by `ews_predictor_new`.
/// - `inputs_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `ews_free_string`.
/// - Returns NULL if the model fails; call `ews_last_error` to get the message.
#[no_mangle]
pub unsafe extern "C" fn ews_predictor_submit(
    predictor: *const EwsPredictorHandle,
    inputs_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if predictor.is_null() {
        set_last_error("Null predictor pointer");
        return ptr::null_mut();
    }

    let handle = &*predictor;
    let response = parse_inputs(inputs_json).and_then(|raw| {
        match handle.predictor.submit(&raw) {
            Ok(prediction) => Ok(SubmitResponse::Predicted {
                class_label: prediction.class_label(),
                probability_display: prediction.probability_display(),
                prediction,
            }),
            Err(EwsError::Validation(errors)) => Ok(SubmitResponse::Invalid { errors }),
            Err(e) => Err(e),
        }
    });
    respond(response)
}

/// Export submitted inputs as a JSON document.
///
/// # Safety
/// - `predictor` must be a valid pointer returned by `ews_predictor_new`.
/// - `inputs_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `ews_free_string`.
/// - Returns NULL on error; call `ews_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ews_predictor_export(
    predictor: *const EwsPredictorHandle,
    inputs_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if predictor.is_null() {
        set_last_error("Null predictor pointer");
        return ptr::null_mut();
    }

    let handle = &*predictor;
    respond(
        parse_inputs(inputs_json).map(|raw| {
            export_inputs(&raw, handle.predictor.schema(), handle.predictor.encoder())
        }),
    )
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by EWS functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an EWS function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn ews_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next EWS function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn ews_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn ews_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe fn take_json(ptr: *mut c_char) -> serde_json::Value {
        assert!(!ptr.is_null());
        let value = serde_json::from_str(CStr::from_ptr(ptr).to_str().unwrap()).unwrap();
        ews_free_string(ptr);
        value
    }

    fn project_with_model() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        std::fs::create_dir_all(&models).unwrap();
        std::fs::write(
            models.join("logistic_pipeline.json"),
            r#"{
                "intercept": -2.0,
                "numeric": [{ "name": "failures", "coef": 1.5 }],
                "categorical": [{
                    "name": "higher",
                    "categories": [{ "value": 1, "coef": -0.5 }, { "value": 0, "coef": 0.5 }]
                }]
            }"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_ffi_encode_valid_and_invalid() {
        unsafe {
            let defaults = serde_json::to_string(&Schema::builtin().default_inputs()).unwrap();
            let json = CString::new(defaults).unwrap();
            let result = take_json(ews_encode(json.as_ptr()));
            assert_eq!(result["status"], "valid");
            assert_eq!(result["columns"][0], "school");
            assert_eq!(result["encoded"].as_array().unwrap().len(), 32);

            let json = CString::new(r#"{"age": "abc"}"#).unwrap();
            let result = take_json(ews_encode(json.as_ptr()));
            assert_eq!(result["status"], "invalid");
            assert_eq!(result["errors"]["age"], "Enter a number");
            assert_eq!(result["errors"]["school"], "Choose a valid option");
        }
    }

    #[test]
    fn test_ffi_predictor_lifecycle() {
        let project = project_with_model();
        let root = CString::new(project.path().to_str().unwrap()).unwrap();

        unsafe {
            let predictor = ews_predictor_new(root.as_ptr());
            assert!(!predictor.is_null());

            let schema = take_json(ews_predictor_schema(predictor));
            assert_eq!(schema["features"].as_array().unwrap().len(), 32);

            let defaults_ptr = ews_predictor_defaults(predictor);
            assert!(!defaults_ptr.is_null());

            let result = take_json(ews_predictor_submit(predictor, defaults_ptr));
            assert_eq!(result["status"], "predicted");
            assert_eq!(result["class"], "low");
            assert_eq!(result["class_label"], "0 (Low stress)");
            assert!(result["probability"].as_f64().unwrap() < 0.5);

            let export = take_json(ews_predictor_export(predictor, defaults_ptr));
            assert_eq!(export["producer"]["name"], "stress-ews");
            assert_eq!(export["encoded"]["failures"], 0);

            ews_free_string(defaults_ptr);

            let invalid = CString::new(r#"{"failures": "7"}"#).unwrap();
            let result = take_json(ews_predictor_submit(predictor, invalid.as_ptr()));
            assert_eq!(result["status"], "invalid");
            assert_eq!(result["errors"]["failures"], "Choose a valid option");

            ews_predictor_free(predictor);
        }
    }

    #[test]
    fn test_ffi_missing_model_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = CString::new(dir.path().to_str().unwrap()).unwrap();

        unsafe {
            let predictor = ews_predictor_new(root.as_ptr());
            assert!(predictor.is_null());

            let error = ews_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("logistic_pipeline.json"));
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = ews_encode(invalid_json.as_ptr());
            assert!(result.is_null());

            let error = ews_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            assert!(ews_predictor_schema(ptr::null()).is_null());
            assert!(ews_encode(ptr::null()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = ews_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
