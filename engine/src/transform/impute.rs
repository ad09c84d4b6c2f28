//! Imputation of null fields
//!
//! A governed null field takes the batch aggregate if one exists and its
//! type matches the field, otherwise the literal default for the type.
//! Datetime fields are never filled.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::profile::{CleaningProfile, FieldSchema};
use super::stats::StatisticsSnapshot;
use crate::models::{CanonicalRecord, FieldType, FieldValue};

/// Which null fields are filled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ImputationPolicy {
    /// Every imputable field.
    #[default]
    Strict,
    /// Only the listed fields; everything else stays null.
    Conservative { fields: BTreeSet<String> },
}

impl ImputationPolicy {
    pub fn conservative<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ImputationPolicy::Conservative {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the policy allows filling `field`.
    pub fn governs(&self, field: &str) -> bool {
        match self {
            ImputationPolicy::Strict => true,
            ImputationPolicy::Conservative { fields } => fields.contains(field),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ImputationPolicy::Strict => "strict",
            ImputationPolicy::Conservative { .. } => "conservative",
        }
    }
}

/// Where a fill value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSource {
    Aggregate,
    Default,
}

/// Per-field fill counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImputationTally {
    pub from_aggregate: usize,
    pub from_default: usize,
}

impl ImputationTally {
    pub fn total(&self) -> usize {
        self.from_aggregate + self.from_default
    }

    pub fn record(&mut self, source: FillSource) {
        match source {
            FillSource::Aggregate => self.from_aggregate += 1,
            FillSource::Default => self.from_default += 1,
        }
    }
}

/// Fills null fields of canonical records from a statistics snapshot.
#[derive(Debug, Clone)]
pub struct Imputer {
    schema: FieldSchema,
    policy: ImputationPolicy,
    text_default: String,
    numeric_default: f64,
}

impl Imputer {
    pub fn new(schema: FieldSchema, policy: ImputationPolicy) -> Self {
        Self {
            schema,
            policy,
            text_default: "Unknown".to_string(),
            numeric_default: 0.0,
        }
    }

    /// Imputer for the profile's schema and literal defaults under `policy`.
    pub fn from_profile(profile: &CleaningProfile, policy: ImputationPolicy) -> Self {
        Self::new(profile.schema(), policy).with_defaults(
            profile.imputation.text_default.clone(),
            profile.imputation.numeric_default,
        )
    }

    pub fn with_defaults(mut self, text: impl Into<String>, numeric: f64) -> Self {
        self.text_default = text.into();
        self.numeric_default = numeric;
        self
    }

    pub fn policy(&self) -> &ImputationPolicy {
        &self.policy
    }

    fn default_for(&self, field_type: FieldType) -> Option<FieldValue> {
        match field_type {
            FieldType::String => Some(FieldValue::Text(self.text_default.clone())),
            FieldType::Float => Some(FieldValue::Float(self.numeric_default)),
            FieldType::DateTime => None,
        }
    }

    /// Fill one record; returns the record and the fields that were filled.
    pub fn impute(&self, mut record: CanonicalRecord, stats: &StatisticsSnapshot) -> (CanonicalRecord, Vec<(String, FillSource)>) {
        let mut filled = Vec::new();

        for (field, field_type) in &self.schema {
            if !field_type.is_imputable() || !self.policy.governs(field) || !record.is_null(field) {
                continue;
            }

            let aggregate = stats.value(field).filter(|v| v.field_type() == *field_type);
            let (value, source) = match aggregate {
                Some(v) => (Some(v), FillSource::Aggregate),
                None => (self.default_for(*field_type), FillSource::Default),
            };

            if value.is_some() {
                record.fields.insert(field.clone(), value);
                filled.push((field.clone(), source));
            }
        }

        (record, filled)
    }

    /// Fill every record, tallying fills per field.
    pub fn impute_all(
        &self,
        records: Vec<CanonicalRecord>,
        stats: &StatisticsSnapshot,
    ) -> (Vec<CanonicalRecord>, BTreeMap<String, ImputationTally>) {
        let mut tallies: BTreeMap<String, ImputationTally> = BTreeMap::new();

        let records = records
            .into_iter()
            .map(|record| {
                let (record, filled) = self.impute(record, stats);
                for (field, source) in filled {
                    tallies.entry(field).or_default().record(source);
                }
                record
            })
            .collect();

        (records, tallies)
    }
}
