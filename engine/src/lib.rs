//! # Jobclean - job-record reconciliation and cleaning
//!
//! Jobclean turns raw job-record exports (CRM CSV dumps with vendor column
//! names) into a canonical, deduplicated, typed dataset keyed by a job id
//! extracted from a URL column.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│      Pipeline        │────▶│  Canonical  │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ key/coerce/dedup/    │     │  rows+report│
//! └─────────────┘     └─────────────┘     │ stats/impute/derive  │     └─────────────┘
//!                                         └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobclean::{clean_file, default_profile, ImputationPolicy, Pipeline};
//!
//! let pipeline = Pipeline::new(default_profile())?.with_policy(ImputationPolicy::Strict);
//! let output = clean_file("export.csv", &pipeline)?;
//! println!("{} jobs", output.records.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error hierarchy
//! - [`models`] - Raw, typed and canonical records
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Cleaning stages and the pipeline
//! - [`validation`] - Output schema validation
//! - [`api`] - HTTP API server and log stream

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Cleaning
pub mod transform;

// Validation
pub mod validation;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConfigError, ConfigResult, PipelineError, PipelineResult, ServerError, ServerResult};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    column_key,
    fingerprint_of,
    CanonicalRecord,
    DerivedFields,
    FieldType,
    FieldValue,
    RawRecord,
    TypedRow,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_csv,
    parse_csv_file_auto,
    CsvError,
    ParseResult,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid, is_valid_canonical, validate, validate_canonical, validate_rows, ValidationSummary};

// =============================================================================
// Re-exports - Cleaning
// =============================================================================

pub use transform::{
    clean_bytes,
    clean_file,
    clean_files,
    combine_first,
    default_profile,
    Aggregate,
    CleanOutput,
    CleaningProfile,
    DedupOrder,
    Deduplicator,
    DerivedFieldCalculator,
    DigitRunExtractor,
    FieldMapping,
    ImputationPolicy,
    Imputer,
    KeyExtractor,
    Pipeline,
    PolicyMode,
    QualityReport,
    StatisticsAggregator,
    StatisticsSnapshot,
    TypeCoercer,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CleanResponse, CsvMetadata, ResponseMetadata, ValidationStats};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
