//! Domain models for the jobclean reconciliation pipeline.
//!
//! Records move through three shapes:
//!
//! - [`RawRecord`] - one ingested row, column name to raw string (or null)
//! - [`TypedRow`] - a raw row after key extraction and type coercion; the key may be missing
//! - [`CanonicalRecord`] - a typed row whose `job_id` was extracted, ready for
//!   imputation, derivation and final deduplication
//!
//! Field values are typed through [`FieldValue`], declared through [`FieldType`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Serialization format for datetime values in output rows.
pub const DATETIME_OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// =============================================================================
// Column names
// =============================================================================

/// Standardized form of a raw column name.
///
/// Lower-cased, every run of characters outside `[a-z0-9_]` collapsed to a
/// single `_`, leading and trailing `_` stripped. Vendor exports that differ
/// only in spacing, case or punctuation map to the same key.
pub fn column_key(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut key = String::with_capacity(lowered.len());
    let mut in_run = false;

    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            key.push(c);
            in_run = false;
        } else if !in_run {
            key.push('_');
            in_run = true;
        }
    }

    key.trim_matches('_').to_string()
}

// =============================================================================
// Field types and values
// =============================================================================

/// Declared type of a canonical field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Trimmed text; categorical for imputation purposes.
    String,
    /// Floating-point amount; imputed with the median.
    Float,
    /// Date and time; never imputed.
    #[serde(alias = "date", alias = "date_time")]
    DateTime,
}

impl FieldType {
    /// Whether nulls of this type may be filled by the imputer.
    pub fn is_imputable(&self) -> bool {
        !matches!(self, FieldType::DateTime)
    }
}

/// A typed, non-null field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Float(f64),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Text(_) => FieldType::String,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::DateTime(_) => FieldType::DateTime,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// JSON form used in output rows.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => json!(s),
            FieldValue::Float(f) => json!(f),
            FieldValue::DateTime(dt) => json!(dt.format(DATETIME_OUTPUT_FORMAT).to_string()),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_OUTPUT_FORMAT)),
        }
    }
}

// =============================================================================
// Raw records
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct RawCell {
    name: String,
    key: String,
    value: Option<String>,
}

/// One ingested row: an ordered mapping from raw column name to raw value.
///
/// Column lookups go through [`column_key`], so `"Job Link"` and
/// `"job_link"` address the same cell. The content fingerprint is computed
/// once, at construction, over the row exactly as ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    row: usize,
    cells: Vec<RawCell>,
    fingerprint: u64,
}

impl RawRecord {
    /// Build a record from `(column, value)` pairs in header order.
    ///
    /// `row` is the record's position in its input (0-based), used as the
    /// canonical iteration order for tie-breaks.
    pub fn new<I, K>(row: usize, cells: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let cells: Vec<RawCell> = cells
            .into_iter()
            .map(|(name, value)| {
                let name = name.into();
                RawCell {
                    key: column_key(&name),
                    name,
                    value,
                }
            })
            .collect();

        let mut record = Self {
            row,
            cells,
            fingerprint: 0,
        };
        record.fingerprint = fingerprint_of(&record.serialize());
        record
    }

    /// Override the content fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: u64) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Raw value of a column, matched by standardized name.
    pub fn get(&self, column: &str) -> Option<&str> {
        let key = column_key(column);
        self.cells
            .iter()
            .find(|c| c.key == key)
            .and_then(|c| c.value.as_deref())
    }

    /// Whether the row carries the column at all (null or not).
    pub fn has_column(&self, column: &str) -> bool {
        let key = column_key(column);
        self.cells.iter().any(|c| c.key == key)
    }

    /// Natural-key identity used by raw-level deduplication.
    pub fn identity(&self, natural_key: &str) -> Option<&str> {
        self.get(natural_key).map(str::trim).filter(|s| !s.is_empty())
    }

    /// `(column, value)` pairs in header order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.cells
            .iter()
            .map(|c| (c.name.as_str(), c.value.as_deref()))
    }

    /// Column names in header order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|c| c.name.as_str())
    }

    /// Full-row serialization the fingerprint is computed over.
    pub fn serialize(&self) -> String {
        let pairs: Vec<Value> = self
            .cells
            .iter()
            .map(|c| json!([c.name, c.value]))
            .collect();
        Value::Array(pairs).to_string()
    }

    /// Replace values matching any null token (after trimming) with null.
    ///
    /// The fingerprint of the ingested row is preserved.
    pub fn with_null_tokens(&self, tokens: &[String]) -> Self {
        let cells = self
            .cells
            .iter()
            .map(|c| RawCell {
                name: c.name.clone(),
                key: c.key.clone(),
                value: c
                    .value
                    .as_ref()
                    .filter(|v| !tokens.iter().any(|t| t == v.trim()))
                    .cloned(),
            })
            .collect();

        Self {
            row: self.row,
            cells,
            fingerprint: self.fingerprint,
        }
    }

    /// JSON object form (for `parse` output).
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        for cell in &self.cells {
            obj.insert(cell.name.clone(), json!(cell.value));
        }
        Value::Object(obj)
    }
}

/// Stable 64-bit content fingerprint: the first eight bytes of SHA-256.
pub fn fingerprint_of(content: &str) -> u64 {
    let digest = Sha256::digest(content.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

// =============================================================================
// Typed rows
// =============================================================================

/// Nullable typed fields keyed by canonical name.
pub type FieldMap = BTreeMap<String, Option<FieldValue>>;

/// A raw row after key extraction and type coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRow {
    pub job_id: Option<i64>,
    pub source_row: usize,
    pub fingerprint: u64,
    pub fields: FieldMap,
}

impl TypedRow {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).and_then(|v| v.as_ref())
    }

    /// Promote to a canonical record; `None` when no key was extracted.
    pub fn into_canonical(self) -> Option<CanonicalRecord> {
        let job_id = self.job_id?;
        Some(CanonicalRecord {
            job_id,
            source_row: self.source_row,
            fingerprint: self.fingerprint,
            fields: self.fields,
            derived: None,
        })
    }
}

// =============================================================================
// Canonical records
// =============================================================================

/// Fields computed from an already-canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub is_complete: bool,
    pub customer_full_name: Option<String>,
    pub is_insurance_claim: bool,
    pub job_duration_days: Option<i64>,
}

/// A typed row keyed by an extracted `job_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub job_id: i64,
    pub source_row: usize,
    pub fingerprint: u64,
    pub fields: FieldMap,
    pub derived: Option<DerivedFields>,
}

impl CanonicalRecord {
    pub fn new(job_id: i64, fingerprint: u64) -> Self {
        Self {
            job_id,
            source_row: 0,
            fingerprint,
            fields: FieldMap::new(),
            derived: None,
        }
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, field: impl Into<String>, value: Option<FieldValue>) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).and_then(|v| v.as_ref())
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn float(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_float)
    }

    pub fn datetime(&self, field: &str) -> Option<NaiveDateTime> {
        self.get(field).and_then(FieldValue::as_datetime)
    }

    /// Whether a field is null. `job_id` is never null; unknown fields are.
    pub fn is_null(&self, field: &str) -> bool {
        if field == "job_id" {
            return false;
        }
        self.get(field).is_none()
    }

    /// Flat JSON object of `job_id`, every mapped field and the derived fields.
    ///
    /// Keys come out in lexicographic order.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("job_id".to_string(), json!(self.job_id));

        for (name, value) in &self.fields {
            let v = value.as_ref().map(FieldValue::to_json).unwrap_or(Value::Null);
            obj.insert(name.clone(), v);
        }

        if let Some(ref derived) = self.derived {
            obj.insert("is_complete".to_string(), json!(derived.is_complete));
            obj.insert("customer_full_name".to_string(), json!(derived.customer_full_name));
            obj.insert("is_insurance_claim".to_string(), json!(derived.is_insurance_claim));
            obj.insert("job_duration_days".to_string(), json!(derived.job_duration_days));
        }

        Value::Object(obj)
    }
}

impl Serialize for CanonicalRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
