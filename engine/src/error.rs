//! Error types for the jobclean reconciliation pipeline.
//!
//! Only configuration-level problems are errors. Per-row data quality
//! issues (unparseable values, missing keys) degrade to nulls or row
//! exclusions and are counted in the [`crate::transform::QualityReport`].
//!
//! - [`CsvError`] - CSV ingestion errors (defined in [`crate::parser`])
//! - [`ConfigError`] - Cleaning profile errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

pub use crate::parser::CsvError;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in a cleaning profile or its fit to the input.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Profile JSON could not be read.
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// Configured columns that no raw row carries.
    #[error("Configured column(s) absent from every input row: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    /// Key anchor is not a usable pattern.
    #[error("Invalid key anchor '{anchor}': {message}")]
    InvalidAnchor { anchor: String, message: String },

    /// Two mappings write the same canonical field.
    #[error("Canonical field '{0}' is mapped more than once")]
    DuplicateTarget(String),

    /// A mapping targets `job_id` or a derived field.
    #[error("Canonical field '{0}' is computed and cannot be mapped")]
    ReservedTarget(String),

    /// A policy or derived field names a field the profile never maps.
    #[error("Unknown canonical field referenced: {0}")]
    UnknownField(String),

    /// JSON error.
    #[error("Profile JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No records to clean.
    #[error("No records to clean")]
    EmptyInput,

    /// Every input batch failed or produced no job records.
    #[error("All {0} batch(es) were excluded")]
    NoUsableBatches(usize),

    /// Profile error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// CSV ingestion error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for profile operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ConfigError -> PipelineError
        let config_err = ConfigError::MissingColumns {
            columns: vec!["Job Link".into(), "Status".into()],
        };
        let pipeline_err: PipelineError = config_err.into();
        let msg = pipeline_err.to_string();
        assert!(msg.contains("Job Link, Status"));

        // CsvError -> PipelineError -> ServerError
        let csv_err = CsvError::new(1, "Empty CSV file");
        let pipeline_err: PipelineError = csv_err.into();
        let server_err: ServerError = pipeline_err.into();
        assert!(server_err.to_string().contains("Empty CSV file"));
    }

    #[test]
    fn test_empty_input_is_distinct() {
        let err = PipelineError::EmptyInput;
        assert!(matches!(err, PipelineError::EmptyInput));
        assert_eq!(err.to_string(), "No records to clean");
    }
}
