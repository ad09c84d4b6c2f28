//! Quality report returned alongside every cleaned batch.

use serde::Serialize;
use std::collections::BTreeMap;

use super::impute::ImputationTally;
use super::prefilter::standardize_headers;
use super::profile::CleaningProfile;
use super::stats::StatisticsSnapshot;
use crate::models::{column_key, RawRecord};

/// Row counts at each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub input: usize,
    pub summary_rows_removed: usize,
    pub raw_duplicates_removed: usize,
    pub missing_key_excluded: usize,
    pub key_collisions_resolved: usize,
    pub output: usize,
}

/// What happened to a raw column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnAction {
    /// Source of the job identifier
    Key,
    /// Mapped, no nulls filled
    Kept,
    /// Mapped, some nulls filled
    Filled,
    /// Not read by the profile
    Unmapped,
}

/// Per raw column summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnReport {
    pub original_column: String,
    pub standardized: String,
    pub target: Option<String>,
    pub missing_percent_before: f64,
    pub action: ColumnAction,
    pub detail: String,
}

/// Per canonical field counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub coercion_failures: usize,
    pub imputed: ImputationTally,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub policy: String,
    pub rows: RowCounts,
    pub columns: Vec<ColumnReport>,
    pub fields: BTreeMap<String, FieldReport>,
    pub schema_violations: usize,
}

/// Distinct columns in first-seen order across all rows.
pub fn observed_columns(records: &[RawRecord]) -> Vec<String> {
    let names: Vec<String> = records
        .iter()
        .flat_map(|r| r.column_names().map(String::from))
        .collect();
    standardize_headers(&names).into_iter().map(|(name, _)| name).collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl QualityReport {
    pub fn new(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            ..Default::default()
        }
    }

    /// Measure null percentages of every column, before any row is dropped.
    pub fn measure_columns(&mut self, records: &[RawRecord]) {
        let total = records.len();

        self.columns = observed_columns(records)
            .into_iter()
            .map(|name| {
                let nulls = records.iter().filter(|r| r.get(&name).is_none()).count();
                let missing = if total == 0 {
                    0.0
                } else {
                    round2(nulls as f64 * 100.0 / total as f64)
                };
                ColumnReport {
                    standardized: column_key(&name),
                    original_column: name,
                    target: None,
                    missing_percent_before: missing,
                    action: ColumnAction::Unmapped,
                    detail: String::new(),
                }
            })
            .collect();
    }

    pub fn field_mut(&mut self, field: &str) -> &mut FieldReport {
        self.fields.entry(field.to_string()).or_default()
    }

    pub fn record_imputations(&mut self, tallies: BTreeMap<String, ImputationTally>) {
        for (field, tally) in tallies {
            self.field_mut(&field).imputed = tally;
        }
    }

    /// Resolve each column's target and action once the batch is done.
    pub fn annotate_columns(&mut self, profile: &CleaningProfile, key_column: Option<&str>, stats: &StatisticsSnapshot) {
        let key_std = key_column.map(column_key);

        for col in &mut self.columns {
            let mapping = profile.fields.iter().find(|m| column_key(&m.source) == col.standardized);
            col.target = mapping.map(|m| m.target.clone());

            if key_std.as_deref() == Some(col.standardized.as_str()) {
                col.action = ColumnAction::Key;
                col.detail = "job_id extracted".to_string();
                continue;
            }

            let Some(mapping) = mapping else {
                col.action = ColumnAction::Unmapped;
                col.detail = "not mapped to a canonical field".to_string();
                continue;
            };

            let field = self.fields.get(&mapping.target).cloned().unwrap_or_default();
            let mut notes = Vec::new();

            if field.imputed.from_aggregate > 0 {
                let source = stats
                    .get(&mapping.target)
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "aggregate".to_string());
                notes.push(format!("Filled {} with {}", field.imputed.from_aggregate, source));
            }
            if field.imputed.from_default > 0 {
                notes.push(format!("Filled {} with default", field.imputed.from_default));
            }
            if field.coercion_failures > 0 {
                notes.push(format!("{} unparseable as {:?}", field.coercion_failures, mapping.field_type).to_lowercase());
            }

            col.action = if field.imputed.total() > 0 {
                ColumnAction::Filled
            } else {
                ColumnAction::Kept
            };
            col.detail = notes.join(" | ");
        }
    }

    pub fn imputed_total(&self) -> usize {
        self.fields.values().map(|f| f.imputed.total()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;
    use crate::transform::profile::FieldMapping;
    use crate::transform::stats::Aggregate;

    fn rows() -> Vec<RawRecord> {
        vec![
            RawRecord::new(0, vec![("Job Link", Some("/job/1".to_string())), ("Salary", None), ("Misc", Some("x".to_string()))]),
            RawRecord::new(1, vec![("Job Link", Some("/job/2".to_string())), ("Salary", Some("10".to_string())), ("Misc", None)]),
            RawRecord::new(2, vec![("Job Link", Some("/job/3".to_string())), ("Salary", None), ("Misc", None)]),
        ]
    }

    #[test]
    fn test_missing_percent() {
        let mut report = QualityReport::new("strict");
        report.measure_columns(&rows());

        assert_eq!(report.columns.len(), 3);
        assert_eq!(report.columns[0].missing_percent_before, 0.0);
        assert_eq!(report.columns[1].missing_percent_before, 66.67);
        assert_eq!(report.columns[2].standardized, "misc");
    }

    #[test]
    fn test_annotate_actions() {
        let profile = CleaningProfile::with_fields(vec![FieldMapping::new("Salary", "salary", FieldType::Float)]);
        let stats = StatisticsSnapshot::from_aggregates([("salary", Aggregate::Median(Some(10.0)))]);

        let mut report = QualityReport::new("strict");
        report.measure_columns(&rows());
        report.record_imputations(
            [(
                "salary".to_string(),
                ImputationTally {
                    from_aggregate: 2,
                    from_default: 0,
                },
            )]
            .into_iter()
            .collect(),
        );
        report.annotate_columns(&profile, Some("Job Link"), &stats);

        assert_eq!(report.columns[0].action, ColumnAction::Key);
        assert_eq!(report.columns[1].action, ColumnAction::Filled);
        assert_eq!(report.columns[1].target.as_deref(), Some("salary"));
        assert_eq!(report.columns[1].detail, "Filled 2 with median (10)");
        assert_eq!(report.columns[2].action, ColumnAction::Unmapped);
        assert_eq!(report.imputed_total(), 2);
    }

    #[test]
    fn test_observed_columns_union() {
        let rows = vec![
            RawRecord::new(0, vec![("a", None::<String>)]),
            RawRecord::new(1, vec![("A", None), ("b", None)]),
        ];
        assert_eq!(observed_columns(&rows), vec!["a".to_string(), "b".to_string()]);
    }
}
