//! Whole-batch statistics used as imputation sources.
//!
//! Numeric fields get the exact median of their non-null values, string
//! fields get the mode. Mode ties go to the value seen first in the batch's
//! iteration order. Accumulators merge associatively, so a batch can be
//! split across threads and recombined without changing the result.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::thread;

use crate::models::{FieldType, FieldValue, TypedRow};
use super::profile::CleaningProfile;

/// One computed aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Aggregate {
    Median(Option<f64>),
    Mode(Option<String>),
}

impl Aggregate {
    /// The aggregate as a fill value, if one was computed.
    pub fn value(&self) -> Option<FieldValue> {
        match self {
            Aggregate::Median(v) => v.map(FieldValue::Float),
            Aggregate::Mode(v) => v.clone().map(FieldValue::Text),
        }
    }
}

impl std::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregate::Median(Some(v)) => write!(f, "median ({})", v),
            Aggregate::Mode(Some(v)) => write!(f, "mode ('{}')", v),
            Aggregate::Median(None) => write!(f, "median (none)"),
            Aggregate::Mode(None) => write!(f, "mode (none)"),
        }
    }
}

/// Aggregate for one field plus how many non-null values fed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStatistic {
    pub aggregate: Aggregate,
    pub non_null: usize,
}

/// Immutable per-batch statistics, computed once before imputation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    rows: usize,
    fields: BTreeMap<String, FieldStatistic>,
}

impl StatisticsSnapshot {
    /// Build a snapshot directly from aggregates.
    pub fn from_aggregates<I, S>(aggregates: I) -> Self
    where
        I: IntoIterator<Item = (S, Aggregate)>,
        S: Into<String>,
    {
        let fields = aggregates
            .into_iter()
            .map(|(name, aggregate)| (name.into(), FieldStatistic { aggregate, non_null: 0 }))
            .collect();
        Self { rows: 0, fields }
    }

    /// Rows the snapshot was computed over.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn get(&self, field: &str) -> Option<&Aggregate> {
        self.fields.get(field).map(|s| &s.aggregate)
    }

    /// Fill value for a field, if its aggregate is non-null.
    pub fn value(&self, field: &str) -> Option<FieldValue> {
        self.get(field).and_then(Aggregate::value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldStatistic)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tally {
    count: usize,
    first_seen: usize,
}

/// Partial statistics over a slice of a batch.
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    rows: usize,
    numeric: BTreeMap<String, Vec<f64>>,
    categorical: BTreeMap<String, HashMap<String, Tally>>,
}

impl StatsAccumulator {
    /// Observe one row. `position` is the row's index in the whole batch.
    pub fn observe(&mut self, position: usize, row: &TypedRow) {
        self.rows += 1;

        for (field, samples) in self.numeric.iter_mut() {
            if let Some(v) = row.get(field).and_then(FieldValue::as_float) {
                samples.push(v);
            }
        }

        for (field, tallies) in self.categorical.iter_mut() {
            if let Some(v) = row.get(field).and_then(FieldValue::as_text) {
                tallies
                    .entry(v.to_string())
                    .and_modify(|t| {
                        t.count += 1;
                        t.first_seen = t.first_seen.min(position);
                    })
                    .or_insert(Tally {
                        count: 1,
                        first_seen: position,
                    });
            }
        }
    }

    /// Combine two partial accumulators over disjoint rows.
    pub fn merge(mut self, other: StatsAccumulator) -> StatsAccumulator {
        self.rows += other.rows;

        for (field, samples) in other.numeric {
            self.numeric.entry(field).or_default().extend(samples);
        }

        for (field, tallies) in other.categorical {
            let mine = self.categorical.entry(field).or_default();
            for (value, t) in tallies {
                mine.entry(value)
                    .and_modify(|m| {
                        m.count += t.count;
                        m.first_seen = m.first_seen.min(t.first_seen);
                    })
                    .or_insert(t);
            }
        }

        self
    }

    /// Resolve the partial tallies into a snapshot.
    pub fn finish(self) -> StatisticsSnapshot {
        let mut fields = BTreeMap::new();

        for (field, mut samples) in self.numeric {
            let non_null = samples.len();
            fields.insert(
                field,
                FieldStatistic {
                    aggregate: Aggregate::Median(median(&mut samples)),
                    non_null,
                },
            );
        }

        for (field, tallies) in self.categorical {
            let non_null = tallies.values().map(|t| t.count).sum();
            let mode = tallies
                .into_iter()
                .max_by(|(_, a), (_, b)| a.count.cmp(&b.count).then(b.first_seen.cmp(&a.first_seen)))
                .map(|(value, _)| value);
            fields.insert(
                field,
                FieldStatistic {
                    aggregate: Aggregate::Mode(mode),
                    non_null,
                },
            );
        }

        StatisticsSnapshot {
            rows: self.rows,
            fields,
        }
    }
}

/// Exact median; the mean of the two middle values for even counts.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Computes a [`StatisticsSnapshot`] for a fixed set of fields.
#[derive(Debug, Clone, Default)]
pub struct StatisticsAggregator {
    numeric: Vec<String>,
    categorical: Vec<String>,
}

impl StatisticsAggregator {
    pub fn new(numeric: Vec<String>, categorical: Vec<String>) -> Self {
        Self { numeric, categorical }
    }

    /// Median for every imputable float field, mode for every imputable string field.
    pub fn from_profile(profile: &CleaningProfile) -> Self {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for (field, field_type) in profile.imputable_fields() {
            match field_type {
                FieldType::Float => numeric.push(field),
                FieldType::String => categorical.push(field),
                FieldType::DateTime => {}
            }
        }
        Self::new(numeric, categorical)
    }

    /// An empty accumulator that tracks this aggregator's fields.
    pub fn accumulator(&self) -> StatsAccumulator {
        StatsAccumulator {
            rows: 0,
            numeric: self.numeric.iter().map(|f| (f.clone(), Vec::new())).collect(),
            categorical: self.categorical.iter().map(|f| (f.clone(), HashMap::new())).collect(),
        }
    }

    /// Single pass over the batch.
    pub fn aggregate(&self, rows: &[TypedRow]) -> StatisticsSnapshot {
        let mut acc = self.accumulator();
        for (position, row) in rows.iter().enumerate() {
            acc.observe(position, row);
        }
        acc.finish()
    }

    /// Split the batch into contiguous partitions, accumulate each on its
    /// own thread and merge. Equal to [`Self::aggregate`] for any partition count.
    pub fn aggregate_partitioned(&self, rows: &[TypedRow], partitions: usize) -> StatisticsSnapshot {
        if partitions <= 1 || rows.len() < 2 {
            return self.aggregate(rows);
        }

        let chunk_size = rows.len().div_ceil(partitions);

        let partials: Vec<StatsAccumulator> = thread::scope(|scope| {
            let handles: Vec<_> = rows
                .chunks(chunk_size)
                .enumerate()
                .map(|(chunk_idx, chunk)| {
                    let offset = chunk_idx * chunk_size;
                    let mut acc = self.accumulator();
                    scope.spawn(move || {
                        for (i, row) in chunk.iter().enumerate() {
                            acc.observe(offset + i, row);
                        }
                        acc
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(acc) => acc,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        partials
            .into_iter()
            .fold(self.accumulator(), StatsAccumulator::merge)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldMap;

    fn row(salary: Option<f64>, status: Option<&str>) -> TypedRow {
        let mut fields = FieldMap::new();
        fields.insert("salary".into(), salary.map(FieldValue::Float));
        fields.insert("status".into(), status.map(|s| FieldValue::Text(s.into())));
        TypedRow {
            job_id: None,
            source_row: 0,
            fingerprint: 0,
            fields,
        }
    }

    fn aggregator() -> StatisticsAggregator {
        StatisticsAggregator::new(vec!["salary".into()], vec!["status".into()])
    }

    #[test]
    fn test_median_ignores_nulls() {
        let rows = vec![
            row(Some(40000.0), None),
            row(None, None),
            row(Some(60000.0), None),
            row(Some(50000.0), None),
        ];
        let snap = aggregator().aggregate(&rows);
        assert_eq!(snap.get("salary"), Some(&Aggregate::Median(Some(50000.0))));
        assert_eq!(snap.rows(), 4);
    }

    #[test]
    fn test_even_median_is_midpoint() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut values), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_all_null_aggregates_are_null() {
        let rows = vec![row(None, None), row(None, None)];
        let snap = aggregator().aggregate(&rows);
        assert_eq!(snap.get("salary"), Some(&Aggregate::Median(None)));
        assert_eq!(snap.get("status"), Some(&Aggregate::Mode(None)));
        assert_eq!(snap.value("salary"), None);
    }

    #[test]
    fn test_mode_tie_goes_to_first_seen() {
        let rows = vec![
            row(None, Some("Pending")),
            row(None, Some("Closed")),
            row(None, Some("Closed")),
            row(None, Some("Pending")),
            row(None, Some("Open")),
        ];
        let snap = aggregator().aggregate(&rows);
        assert_eq!(snap.get("status"), Some(&Aggregate::Mode(Some("Pending".into()))));
    }

    #[test]
    fn test_mode_majority_wins() {
        let rows = vec![row(None, Some("A")), row(None, Some("B")), row(None, Some("B"))];
        let snap = aggregator().aggregate(&rows);
        assert_eq!(snap.value("status"), Some(FieldValue::Text("B".into())));
    }

    #[test]
    fn test_partitioned_matches_sequential() {
        let statuses = ["Open", "Closed", "Open", "Closed", "Lead", "Closed", "Open", "Lead", "Lead"];
        let rows: Vec<TypedRow> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| row(if i % 3 == 0 { None } else { Some(i as f64 * 10.0) }, Some(s)))
            .collect();

        let agg = aggregator();
        let sequential = agg.aggregate(&rows);
        for partitions in [2, 3, 4, 16] {
            assert_eq!(agg.aggregate_partitioned(&rows, partitions), sequential);
        }
    }

    #[test]
    fn test_merge_keeps_global_first_seen() {
        let agg = aggregator();
        let mut left = agg.accumulator();
        let mut right = agg.accumulator();
        // "B" appears first globally but only in the right partition's offset range
        right.observe(0, &row(None, Some("B")));
        left.observe(1, &row(None, Some("A")));

        let snap = left.merge(right).finish();
        assert_eq!(snap.value("status"), Some(FieldValue::Text("B".into())));
    }

    #[test]
    fn test_snapshot_serializes_kind_and_value() {
        let snap = StatisticsSnapshot::from_aggregates([("salary", Aggregate::Median(Some(50000.0)))]);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["fields"]["salary"]["aggregate"]["kind"], "median");
        assert_eq!(json["fields"]["salary"]["aggregate"]["value"], 50000.0);
    }
}
