//! Derived fields
//!
//! Pure functions over a canonical (and possibly imputed) record.

use crate::models::{CanonicalRecord, DerivedFields};
use super::profile::{CleaningProfile, DerivedSpec, DurationSpec};

/// Names of derived output columns, in output order.
pub const DERIVED_FIELDS: [&str; 4] = ["is_complete", "customer_full_name", "is_insurance_claim", "job_duration_days"];

/// True iff every required field is non-null.
pub fn is_complete(record: &CanonicalRecord, required: &[String]) -> bool {
    required.iter().all(|field| !record.is_null(field))
}

/// Trimmed, non-empty string values joined with single spaces.
pub fn concatenate(record: &CanonicalRecord, fields: &[String]) -> Option<String> {
    let parts: Vec<&str> = fields
        .iter()
        .filter_map(|f| record.text(f))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// True iff the field is non-null and not the `unknown` sentinel.
pub fn is_known(record: &CanonicalRecord, field: &str) -> bool {
    match record.get(field) {
        None => false,
        Some(value) => !value.to_string().trim().eq_ignore_ascii_case("unknown"),
    }
}

/// Whole calendar days from `start` to `end`; null if either is null.
pub fn day_difference(record: &CanonicalRecord, start: &str, end: &str) -> Option<i64> {
    let start = record.datetime(start)?;
    let end = record.datetime(end)?;
    Some((end.date() - start.date()).num_days())
}

/// Computes [`DerivedFields`] for canonical records.
#[derive(Debug, Clone, Default)]
pub struct DerivedFieldCalculator {
    config: DerivedSpec,
}

impl DerivedFieldCalculator {
    pub fn new(config: DerivedSpec) -> Self {
        Self { config }
    }

    pub fn from_profile(profile: &CleaningProfile) -> Self {
        Self::new(profile.derived.clone())
    }

    pub fn compute(&self, record: &CanonicalRecord) -> DerivedFields {
        DerivedFields {
            is_complete: is_complete(record, &self.config.required),
            customer_full_name: concatenate(record, &self.config.full_name),
            is_insurance_claim: self
                .config
                .claim_field
                .as_deref()
                .map(|f| is_known(record, f))
                .unwrap_or(false),
            job_duration_days: self
                .config
                .duration
                .as_ref()
                .and_then(|DurationSpec { start, end }| day_difference(record, start, end)),
        }
    }

    /// Attach freshly computed derived fields to a record.
    pub fn apply(&self, mut record: CanonicalRecord) -> CanonicalRecord {
        record.derived = Some(self.compute(&record));
        record
    }
}
