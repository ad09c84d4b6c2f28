//! REST API response types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::transform::pipeline::CleanOutput;
use crate::transform::report::QualityReport;
use crate::transform::stats::StatisticsSnapshot;

/// Response sent after a CSV upload is cleaned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanResponse {
    /// Unique identifier of this cleaning run
    pub batch_id: String,

    /// "ready" when every row passed schema validation, "warning" otherwise
    pub status: String,

    /// Canonical job records, ordered by job_id
    pub records: Vec<Value>,

    /// Aggregates used for imputation
    pub statistics: StatisticsSnapshot,

    /// Row counts, column actions and per-field tallies
    pub report: QualityReport,

    pub metadata: ResponseMetadata,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_records: usize,
    pub policy: String,
    pub csv_info: Option<CsvMetadata>,
    pub validation: ValidationStats,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Validation statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub valid: usize,
    pub invalid: usize,
}

impl From<CleanOutput> for CleanResponse {
    fn from(output: CleanOutput) -> Self {
        let records = output.to_values();
        let total = records.len();
        let invalid = output.report.schema_violations;

        CleanResponse {
            batch_id: Uuid::new_v4().to_string(),
            status: if invalid == 0 { "ready" } else { "warning" }.to_string(),
            records,
            metadata: ResponseMetadata {
                total_records: total,
                policy: output.report.policy.clone(),
                csv_info: output.csv_info.map(|info| CsvMetadata {
                    encoding: info.encoding,
                    delimiter: info.delimiter.to_string(),
                    row_count: info.row_count,
                    columns: info.headers,
                }),
                validation: ValidationStats {
                    valid: total.saturating_sub(invalid),
                    invalid,
                },
            },
            statistics: output.statistics,
            report: output.report,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "batchId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "records": [],
        "metadata": {
            "totalRecords": 0
        }
    })
}
