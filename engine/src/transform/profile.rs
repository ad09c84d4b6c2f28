//! Cleaning profile definition
//!
//! The profile maps vendor columns to canonical fields and carries every
//! policy the pipeline can be tuned with. Profiles are plain JSON so one
//! per export source can be kept next to the data.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::dedup::DedupOrder;
use super::derive::DERIVED_FIELDS;
use super::impute::ImputationPolicy;
use crate::error::{ConfigError, ConfigResult};
use crate::models::{column_key, FieldType, RawRecord};

/// Canonical field name to declared type.
pub type FieldSchema = BTreeMap<String, FieldType>;

/// A complete cleaning profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningProfile {
    /// Version of the profile format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Where the job identifier comes from
    #[serde(default)]
    pub key: KeySpec,

    /// Raw column to canonical field mappings, in output order
    pub fields: Vec<FieldMapping>,

    /// Raw-level deduplication (stage A)
    #[serde(default)]
    pub raw_dedup: RawDedupSpec,

    /// Ordering used by canonical-level deduplication (stage B)
    #[serde(default = "default_final_order")]
    pub final_dedup: DedupOrder,

    /// Imputation settings
    #[serde(default)]
    pub imputation: ImputationSpec,

    /// Derived-field wiring
    #[serde(default)]
    pub derived: DerivedSpec,

    /// Datetime patterns tried in order
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,

    /// Raw values treated as null (compared after trimming)
    #[serde(default = "default_null_tokens")]
    pub null_tokens: Vec<String>,

    /// Whether a string that is empty after trimming becomes null
    #[serde(default = "default_true")]
    pub empty_string_is_null: bool,

    /// Whether summary/total rows are removed before deduplication
    #[serde(default = "default_true")]
    pub drop_summary_rows: bool,

    /// Number of partitions statistics are accumulated over
    #[serde(default = "default_stats_partitions")]
    pub stats_partitions: usize,
}

/// Source of the job identifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeySpec {
    /// Raw URL-like column; auto-detected when absent
    #[serde(default)]
    pub source: Option<String>,

    /// Literal text the digit run must directly follow (e.g. `/job/`)
    #[serde(default)]
    pub anchor: Option<String>,
}

/// Mapping of one raw column to one canonical field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMapping {
    /// Raw column name (matched by standardized form)
    pub source: String,
    /// Canonical field name
    pub target: String,
    /// Declared canonical type
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Raw-level deduplication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDedupSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Raw column identifying a listing; defaults to the key source column
    #[serde(default)]
    pub natural_key: Option<String>,

    /// Ordering within a partition; `recency` columns are raw columns here
    #[serde(default = "default_raw_order")]
    pub order: DedupOrder,
}

/// Imputation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputationSpec {
    /// Which policy runs by default
    #[serde(default)]
    pub mode: PolicyMode,

    /// Fields the conservative policy fills
    #[serde(default)]
    pub conservative_fields: Vec<String>,

    /// Fields that receive an aggregate; all string and float fields when absent
    #[serde(default)]
    pub imputable: Option<Vec<String>>,

    /// Literal fallback for string fields
    #[serde(default = "default_text_fill")]
    pub text_default: String,

    /// Literal fallback for float fields
    #[serde(default)]
    pub numeric_default: f64,
}

/// Policy selector used in profile files and on the command line
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    #[default]
    Strict,
    Conservative,
}

impl std::str::FromStr for PolicyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(PolicyMode::Strict),
            "conservative" => Ok(PolicyMode::Conservative),
            other => Err(format!("unknown imputation policy '{}'", other)),
        }
    }
}

/// Derived-field wiring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedSpec {
    /// Fields that must all be non-null for `is_complete`
    #[serde(default = "default_required")]
    pub required: Vec<String>,

    /// Fields joined into `customer_full_name`
    #[serde(default = "default_full_name")]
    pub full_name: Vec<String>,

    /// Field whose known value marks an insurance claim
    #[serde(default = "default_claim_field")]
    pub claim_field: Option<String>,

    /// Endpoints of `job_duration_days`
    #[serde(default = "default_duration")]
    pub duration: Option<DurationSpec>,
}

/// Start and end datetime fields of a duration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurationSpec {
    pub start: String,
    pub end: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_final_order() -> DedupOrder {
    DedupOrder::Fingerprint
}

fn default_raw_order() -> DedupOrder {
    DedupOrder::InputOrder
}

fn default_stats_partitions() -> usize {
    1
}

fn default_text_fill() -> String {
    "Unknown".to_string()
}

fn default_required() -> Vec<String> {
    ["job_id", "first_name", "last_name", "address"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_full_name() -> Vec<String> {
    vec!["first_name".to_string(), "last_name".to_string()]
}

fn default_claim_field() -> Option<String> {
    Some("insurance_company".to_string())
}

fn default_duration() -> Option<DurationSpec> {
    Some(DurationSpec {
        start: "date_created".to_string(),
        end: "date_completed".to_string(),
    })
}

/// Datetime patterns tried in order; the first match wins.
pub fn default_date_formats() -> Vec<String> {
    [
        "%m/%d/%Y %I:%M%p",
        "%m/%d/%Y %I:%M %p",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%m/%d/%Y",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Raw values read as null.
pub fn default_null_tokens() -> Vec<String> {
    ["", "NULL", "null", "N/A", "n/a"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RawDedupSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            natural_key: None,
            order: default_raw_order(),
        }
    }
}

impl Default for ImputationSpec {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Strict,
            conservative_fields: Vec::new(),
            imputable: None,
            text_default: default_text_fill(),
            numeric_default: 0.0,
        }
    }
}

impl ImputationSpec {
    /// The policy selected by `mode`.
    pub fn policy(&self) -> ImputationPolicy {
        self.policy_for(self.mode)
    }

    /// The policy for an explicitly chosen mode.
    pub fn policy_for(&self, mode: PolicyMode) -> ImputationPolicy {
        match mode {
            PolicyMode::Strict => ImputationPolicy::Strict,
            PolicyMode::Conservative => ImputationPolicy::conservative(self.conservative_fields.iter().cloned()),
        }
    }
}

impl Default for DerivedSpec {
    fn default() -> Self {
        Self {
            required: default_required(),
            full_name: default_full_name(),
            claim_field: default_claim_field(),
            duration: default_duration(),
        }
    }
}

impl FieldMapping {
    pub fn new(source: &str, target: &str, field_type: FieldType) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            field_type,
        }
    }
}

impl CleaningProfile {
    /// A profile with the given mappings and every other setting at its default.
    pub fn with_fields(fields: Vec<FieldMapping>) -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            key: KeySpec::default(),
            fields,
            raw_dedup: RawDedupSpec::default(),
            final_dedup: default_final_order(),
            imputation: ImputationSpec::default(),
            derived: DerivedSpec::default(),
            date_formats: default_date_formats(),
            null_tokens: default_null_tokens(),
            empty_string_is_null: true,
            drop_summary_rows: true,
            stats_partitions: default_stats_partitions(),
        }
    }

    /// Parse a profile from JSON string
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a profile from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::InvalidProfile(format!("cannot read '{}': {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Canonical field types, keyed by target name
    pub fn schema(&self) -> FieldSchema {
        self.fields
            .iter()
            .map(|m| (m.target.clone(), m.field_type))
            .collect()
    }

    /// Target names in mapping order
    pub fn targets(&self) -> Vec<String> {
        self.fields.iter().map(|m| m.target.clone()).collect()
    }

    pub fn field_type(&self, target: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|m| m.target == target)
            .map(|m| m.field_type)
    }

    /// Fields that receive a statistical aggregate.
    pub fn imputable_fields(&self) -> Vec<(String, FieldType)> {
        self.fields
            .iter()
            .filter(|m| m.field_type.is_imputable())
            .filter(|m| match self.imputation.imputable {
                Some(ref list) => list.contains(&m.target),
                None => true,
            })
            .map(|m| (m.target.clone(), m.field_type))
            .collect()
    }

    /// Resolve the key source column: configured, or the first column whose
    /// standardized name mentions a URL.
    pub fn resolve_key_column(&self, headers: &[String]) -> Option<String> {
        if let Some(ref source) = self.key.source {
            return Some(source.clone());
        }
        headers
            .iter()
            .find(|h| {
                let key = column_key(h);
                ["url", "link", "href"].iter().any(|kw| key.contains(kw))
            })
            .cloned()
    }

    /// Every raw column the profile reads, given the resolved key column.
    pub fn source_columns(&self, key_column: Option<&str>) -> Vec<String> {
        let mut columns: Vec<String> = self.fields.iter().map(|m| m.source.clone()).collect();

        if let Some(key) = key_column {
            columns.push(key.to_string());
        }
        if self.raw_dedup.enabled {
            if let Some(ref natural) = self.raw_dedup.natural_key {
                columns.push(natural.clone());
            }
            if let DedupOrder::Recency { ref column } = self.raw_dedup.order {
                columns.push(column.clone());
            }
        }

        let mut seen = BTreeSet::new();
        columns.retain(|c| seen.insert(column_key(c)));
        columns
    }

    /// Check that every configured column appears in at least one row.
    pub fn validate_columns(&self, records: &[RawRecord], key_column: Option<&str>) -> ConfigResult<()> {
        let missing: Vec<String> = self
            .source_columns(key_column)
            .into_iter()
            .filter(|col| !records.iter().any(|r| r.has_column(col)))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingColumns { columns: missing })
        }
    }

    /// Check internal consistency of the profile.
    pub fn validate(&self) -> ConfigResult<()> {
        let schema = self.schema();
        if schema.len() != self.fields.len() {
            let mut seen = BTreeSet::new();
            for m in &self.fields {
                if !seen.insert(m.target.as_str()) {
                    return Err(ConfigError::DuplicateTarget(m.target.clone()));
                }
            }
        }
        if schema.contains_key("job_id") {
            return Err(ConfigError::ReservedTarget("job_id".to_string()));
        }
        if let Some(name) = DERIVED_FIELDS.iter().find(|name| schema.contains_key(**name)) {
            return Err(ConfigError::ReservedTarget(name.to_string()));
        }

        let known = |field: &str| field == "job_id" || schema.contains_key(field);

        let referenced = self
            .imputation
            .conservative_fields
            .iter()
            .chain(self.imputation.imputable.iter().flatten())
            .chain(self.derived.required.iter())
            .chain(self.derived.full_name.iter())
            .chain(self.derived.claim_field.iter());
        for field in referenced {
            if !known(field) {
                return Err(ConfigError::UnknownField(field.clone()));
            }
        }

        if let Some(ref duration) = self.derived.duration {
            for field in [&duration.start, &duration.end] {
                if schema.get(field) != Some(&FieldType::DateTime) {
                    return Err(ConfigError::UnknownField(format!("{} (datetime expected)", field)));
                }
            }
        }

        if let DedupOrder::Recency { ref column } = self.final_dedup {
            if schema.get(column) != Some(&FieldType::DateTime) {
                return Err(ConfigError::UnknownField(format!("{} (datetime expected)", column)));
            }
        }

        Ok(())
    }
}

/// The default profile for job-record CRM exports.
pub fn default_profile() -> CleaningProfile {
    use FieldType::{DateTime, Float};

    let fields = vec![
        FieldMapping::new("First Name", "first_name", FieldType::String),
        FieldMapping::new("Last Name", "last_name", FieldType::String),
        FieldMapping::new("Address", "address", FieldType::String),
        FieldMapping::new("City", "city", FieldType::String),
        FieldMapping::new("State", "state", FieldType::String),
        FieldMapping::new("Status", "status", FieldType::String),
        FieldMapping::new("Job Type", "job_type", FieldType::String),
        FieldMapping::new("Sales Rep", "sales_rep", FieldType::String),
        FieldMapping::new("Insurance Company", "insurance_company", FieldType::String),
        FieldMapping::new("Contract Amount", "contract_amount", Float),
        FieldMapping::new("Amount Paid", "amount_paid", Float),
        FieldMapping::new("Balance Due", "balance_due", Float),
        FieldMapping::new("Date Created", "date_created", DateTime),
        FieldMapping::new("Date Completed", "date_completed", DateTime),
        FieldMapping::new("Last Updated", "last_updated", DateTime),
    ];

    let mut profile = CleaningProfile::with_fields(fields);
    profile.description = "Job-record CRM export (job link, customer, financials, lifecycle dates)".to_string();
    profile.key = KeySpec {
        source: Some("Job Link".to_string()),
        anchor: Some("/job/".to_string()),
    };
    profile.raw_dedup.order = DedupOrder::Recency {
        column: "Last Updated".to_string(),
    };
    profile.imputation.conservative_fields = vec![
        "status".to_string(),
        "job_type".to_string(),
        "state".to_string(),
    ];
    profile
}
