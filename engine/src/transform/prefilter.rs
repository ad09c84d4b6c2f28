//! Row-level cleanup applied before deduplication.

use crate::models::{column_key, RawRecord};

/// Words that mark spreadsheet summary rows.
pub const SUMMARY_KEYWORDS: [&str; 5] = ["total", "summary", "average", "count", "subtotal"];

/// Keyword hits needed to call a row a summary row.
const SUMMARY_THRESHOLD: usize = 2;

/// Whether a row looks like a totals/summary line rather than a record.
///
/// The row's non-null values are joined and lower-cased; a row matching at
/// least two distinct keywords is a summary row. `subtotal` also contains
/// `total`, so a lone "Subtotal" cell already counts twice.
pub fn is_summary_row(record: &RawRecord) -> bool {
    let joined = record
        .cells()
        .filter_map(|(_, value)| value)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    SUMMARY_KEYWORDS
        .iter()
        .filter(|kw| joined.contains(*kw))
        .count()
        >= SUMMARY_THRESHOLD
}

/// Drop summary rows; returns survivors and the number removed.
pub fn remove_summary_rows(records: Vec<RawRecord>) -> (Vec<RawRecord>, usize) {
    let before = records.len();
    let kept: Vec<RawRecord> = records.into_iter().filter(|r| !is_summary_row(r)).collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Null out every value matching a null token.
pub fn normalize_null_tokens(records: Vec<RawRecord>, tokens: &[String]) -> Vec<RawRecord> {
    if tokens.is_empty() {
        return records;
    }
    records.iter().map(|r| r.with_null_tokens(tokens)).collect()
}

/// Header names paired with their standardized form, first occurrence only.
pub fn standardize_headers(headers: &[String]) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    headers
        .iter()
        .map(|h| (h.clone(), column_key(h)))
        .filter(|(_, key)| !key.is_empty() && seen.insert(key.clone()))
        .collect()
}
