//! JSON Schema validation of canonical output rows.
//!
//! The canonical row schema (Draft 7) is embedded at compile time from
//! `schemas/canonical-job.json`: `job_id` is a required non-negative
//! integer, derived fields are typed, every other field is a string,
//! number or null.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use jobclean::validation::validate_canonical;
//!
//! let row = json!({ "job_id": 100, "status": "Open", "is_complete": true });
//! assert!(validate_canonical(&row).is_ok());
//! ```

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::Value;

const CANONICAL_SCHEMA: &str = include_str!("../../schemas/canonical-job.json");

static CANONICAL_VALIDATOR: Lazy<Validator> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(CANONICAL_SCHEMA).expect("Invalid embedded schema");
    jsonschema::draft7::new(&schema).expect("Invalid embedded schema")
});

/// Validate a JSON value against an arbitrary schema.
///
/// Returns every violation message when invalid.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;
    collect_errors(&validator, data)
}

/// Quick check against an arbitrary schema.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

fn collect_errors(validator: &Validator, data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The embedded canonical row schema.
pub fn canonical_schema() -> Value {
    serde_json::from_str(CANONICAL_SCHEMA).expect("Invalid embedded schema")
}

/// Validate one canonical output row.
pub fn validate_canonical(data: &Value) -> Result<(), Vec<String>> {
    collect_errors(&CANONICAL_VALIDATOR, data)
}

/// Quick check against the canonical row schema.
pub fn is_valid_canonical(data: &Value) -> bool {
    CANONICAL_VALIDATOR.is_valid(data)
}

/// Validation tally over a set of rows.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ValidationSummary {
    pub valid: usize,
    pub invalid: usize,
    /// First few failures: row index and messages
    pub errors: Vec<(usize, Vec<String>)>,
}

/// Validate many rows, keeping at most `keep_errors` failure details.
pub fn validate_rows(rows: &[Value], keep_errors: usize) -> ValidationSummary {
    let mut summary = ValidationSummary::default();

    for (i, row) in rows.iter().enumerate() {
        match validate_canonical(row) {
            Ok(()) => summary.valid += 1,
            Err(errs) => {
                summary.invalid += 1;
                if summary.errors.len() < keep_errors {
                    summary.errors.push((i, errs));
                }
            }
        }
    }

    summary
}
