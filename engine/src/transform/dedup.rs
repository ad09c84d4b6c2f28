//! Deduplication
//!
//! Both stages partition rows by a key and keep exactly one survivor per
//! partition: the row with the smallest rank under the configured
//! [`DedupOrder`]. Recency ties fall back to the content fingerprint, then to
//! input position, so the survivor does not depend on row order.
//!
//! - Stage A runs on raw rows, keyed by a natural key column.
//! - Stage B runs on canonical records, keyed by `job_id`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use super::coerce::TypeCoercer;
use crate::models::{CanonicalRecord, RawRecord};

/// Ordering inside a dedup partition; the first row wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DedupOrder {
    /// Most recent datetime first, nulls last; ties by ascending fingerprint.
    Recency { column: String },
    /// Ascending content fingerprint of the ingested row.
    Fingerprint,
    /// First row in input order.
    InputOrder,
}

impl std::fmt::Display for DedupOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupOrder::Recency { column } => write!(f, "recency of '{}'", column),
            DedupOrder::Fingerprint => write!(f, "fingerprint"),
            DedupOrder::InputOrder => write!(f, "input order"),
        }
    }
}

/// Survivors in input order, plus how many rows lost their partition.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome<T> {
    pub kept: Vec<T>,
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    // None sorts after every Some under Reverse
    recency: Reverse<Option<NaiveDateTime>>,
    fingerprint: u64,
    position: usize,
}

impl Rank {
    fn new(order: &DedupOrder, position: usize, recency: Option<NaiveDateTime>, fingerprint: u64) -> Self {
        match order {
            DedupOrder::Recency { .. } => Rank {
                recency: Reverse(recency),
                fingerprint,
                position,
            },
            DedupOrder::Fingerprint => Rank {
                recency: Reverse(None),
                fingerprint,
                position,
            },
            DedupOrder::InputOrder => Rank {
                recency: Reverse(None),
                fingerprint: 0,
                position,
            },
        }
    }
}

/// Keep the lowest-ranked item per key. Items without a key are kept as-is.
fn keep_first<T, K, KeyFn, RankFn>(items: Vec<T>, key_of: KeyFn, rank_of: RankFn) -> DedupOutcome<T>
where
    K: Hash + Eq,
    KeyFn: Fn(&T) -> Option<K>,
    RankFn: Fn(usize, &T) -> Rank,
{
    let mut winners: HashMap<K, Rank> = HashMap::new();

    for (position, item) in items.iter().enumerate() {
        let Some(key) = key_of(item) else { continue };
        let rank = rank_of(position, item);
        match winners.entry(key) {
            Entry::Occupied(mut slot) => {
                if rank < *slot.get() {
                    slot.insert(rank);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(rank);
            }
        }
    }

    let survivors: HashSet<usize> = winners.values().map(|r| r.position).collect();
    let total = items.len();

    let kept: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter(|(position, item)| key_of(item).is_none() || survivors.contains(position))
        .map(|(_, item)| item)
        .collect();

    DedupOutcome {
        removed: total - kept.len(),
        kept,
    }
}

/// One dedup stage with a fixed ordering.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    order: DedupOrder,
}

impl Deduplicator {
    pub fn new(order: DedupOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &DedupOrder {
        &self.order
    }

    /// Stage A: partition raw rows by `natural_key`.
    ///
    /// Rows whose natural key is null or blank are never merged with each
    /// other. A recency column is read from the raw row and parsed with the
    /// coercer's date formats.
    pub fn dedup_raw(&self, records: Vec<RawRecord>, natural_key: &str, coercer: &TypeCoercer) -> DedupOutcome<RawRecord> {
        keep_first(
            records,
            |r| r.identity(natural_key).map(str::to_string),
            |position, r| {
                let recency = match self.order {
                    DedupOrder::Recency { ref column } => r.get(column).and_then(|v| coercer.datetime(v)),
                    _ => None,
                };
                Rank::new(&self.order, position, recency, r.fingerprint())
            },
        )
    }

    /// Stage B: partition canonical records by `job_id`.
    pub fn dedup_canonical(&self, records: Vec<CanonicalRecord>) -> DedupOutcome<CanonicalRecord> {
        keep_first(
            records,
            |r| Some(r.job_id),
            |position, r| {
                let recency = match self.order {
                    DedupOrder::Recency { ref column } => r.datetime(column),
                    _ => None,
                };
                Rank::new(&self.order, position, recency, r.fingerprint)
            },
        )
    }
}
