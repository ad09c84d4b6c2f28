//! Combining several cleaned batches on `job_id`.

use std::collections::BTreeMap;

use super::derive::DerivedFieldCalculator;
use crate::models::CanonicalRecord;

/// Merge batches so each `job_id` appears once.
///
/// The record from the earliest batch carrying a `job_id` is the base; each
/// of its null fields takes the value from the first later batch that has
/// one. Derived fields are recomputed on the merged record. Output is
/// ordered by `job_id`.
pub fn combine_first(batches: Vec<Vec<CanonicalRecord>>, derive: &DerivedFieldCalculator) -> Vec<CanonicalRecord> {
    let mut merged: BTreeMap<i64, CanonicalRecord> = BTreeMap::new();

    for batch in batches {
        for record in batch {
            match merged.get_mut(&record.job_id) {
                None => {
                    merged.insert(record.job_id, record);
                }
                Some(base) => fill_nulls(base, record),
            }
        }
    }

    merged.into_values().map(|r| derive.apply(r)).collect()
}

fn fill_nulls(base: &mut CanonicalRecord, other: CanonicalRecord) {
    for (field, value) in other.fields {
        if value.is_none() {
            continue;
        }
        let slot = base.fields.entry(field).or_insert(None);
        if slot.is_none() {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;

    fn text(s: &str) -> Option<FieldValue> {
        Some(FieldValue::Text(s.to_string()))
    }

    #[test]
    fn test_earliest_batch_wins_and_nulls_fill() {
        let first = vec![CanonicalRecord::new(1, 9)
            .with_field("first_name", text("Ada"))
            .with_field("last_name", None)];
        let second = vec![
            CanonicalRecord::new(1, 3)
                .with_field("first_name", text("Augusta"))
                .with_field("last_name", text("Lovelace")),
            CanonicalRecord::new(2, 4).with_field("first_name", text("Grace")),
        ];

        let out = combine_first(vec![first, second], &DerivedFieldCalculator::default());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].job_id, 1);
        assert_eq!(out[0].text("first_name"), Some("Ada"));
        assert_eq!(out[0].text("last_name"), Some("Lovelace"));
        assert_eq!(out[0].fingerprint, 9);
        assert_eq!(
            out[0].derived.as_ref().and_then(|d| d.customer_full_name.as_deref()),
            Some("Ada Lovelace")
        );
        assert_eq!(out[1].job_id, 2);
    }

    #[test]
    fn test_output_sorted_by_job_id() {
        let batch = vec![CanonicalRecord::new(30, 0), CanonicalRecord::new(10, 0), CanonicalRecord::new(20, 0)];
        let ids: Vec<i64> = combine_first(vec![batch], &DerivedFieldCalculator::default())
            .iter()
            .map(|r| r.job_id)
            .collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }
}
