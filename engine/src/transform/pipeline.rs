//! High-level pipeline API: raw rows in, canonical rows out.
//!
//! A run goes through these stages, in this order:
//! null tokens, column checks, summary rows, raw dedup (stage A), key
//! extraction and coercion, statistics, key exclusion, final dedup
//! (stage B), imputation, derived fields, schema validation.
//!
//! # Example
//!
//! ```rust,ignore
//! use jobclean::transform::{clean_file, default_profile, Pipeline};
//!
//! let pipeline = Pipeline::new(default_profile())?;
//! let output = clean_file("export.csv", &pipeline)?;
//! println!("{} jobs, {} imputed values", output.records.len(), output.report.imputed_total());
//! ```

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::coerce::TypeCoercer;
use super::dedup::Deduplicator;
use super::derive::DerivedFieldCalculator;
use super::impute::{ImputationPolicy, Imputer};
use super::key::{DigitRunExtractor, KeyExtractor};
use super::prefilter::{normalize_null_tokens, remove_summary_rows};
use super::profile::CleaningProfile;
use super::report::{observed_columns, QualityReport};
use super::stats::{StatisticsAggregator, StatisticsSnapshot};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, log_error};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{CanonicalRecord, FieldMap, RawRecord, TypedRow};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};
use crate::validation::validate_rows;

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct CleanOutput {
    /// Canonical rows, ordered by `job_id`
    pub records: Vec<CanonicalRecord>,
    /// Aggregates the imputation drew from
    pub statistics: StatisticsSnapshot,
    pub report: QualityReport,
    /// Present when the input came from CSV
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_info: Option<CsvInfo>,
}

impl CleanOutput {
    /// Output rows as JSON objects.
    pub fn to_values(&self) -> Vec<Value> {
        self.records.iter().map(CanonicalRecord::to_value).collect()
    }
}

/// A configured cleaning pipeline.
///
/// Holds no state between runs; statistics are recomputed per batch.
pub struct Pipeline {
    profile: CleaningProfile,
    extractor: Box<dyn KeyExtractor>,
    coercer: TypeCoercer,
    aggregator: StatisticsAggregator,
    raw_dedup: Deduplicator,
    final_dedup: Deduplicator,
    imputer: Imputer,
    derive: DerivedFieldCalculator,
    validate: bool,
}

impl Pipeline {
    /// Build a pipeline from a profile, using the profile's own policy.
    pub fn new(profile: CleaningProfile) -> PipelineResult<Self> {
        profile.validate()?;
        let extractor = DigitRunExtractor::from_anchor(profile.key.anchor.as_deref())?;

        Ok(Self {
            extractor: Box::new(extractor),
            coercer: TypeCoercer::from_profile(&profile),
            aggregator: StatisticsAggregator::from_profile(&profile),
            raw_dedup: Deduplicator::new(profile.raw_dedup.order.clone()),
            final_dedup: Deduplicator::new(profile.final_dedup.clone()),
            imputer: Imputer::from_profile(&profile, profile.imputation.policy()),
            derive: DerivedFieldCalculator::from_profile(&profile),
            validate: true,
            profile,
        })
    }

    /// Override the imputation policy.
    pub fn with_policy(mut self, policy: ImputationPolicy) -> Self {
        self.imputer = Imputer::from_profile(&self.profile, policy);
        self
    }

    /// Swap the key extractor, e.g. for a different URL shape.
    pub fn with_key_extractor(mut self, extractor: impl KeyExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Toggle schema validation of output rows.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn profile(&self) -> &CleaningProfile {
        &self.profile
    }

    pub fn policy(&self) -> &ImputationPolicy {
        self.imputer.policy()
    }

    pub fn derive(&self) -> &DerivedFieldCalculator {
        &self.derive
    }

    /// Extract the key and coerce every mapped field of one raw row.
    ///
    /// Returns the typed row and the fields whose non-blank raw value did
    /// not coerce.
    pub fn canonicalize(&self, record: &RawRecord, key_column: Option<&str>) -> (TypedRow, Vec<String>) {
        let job_id = key_column
            .and_then(|col| record.get(col))
            .and_then(|raw| self.extractor.extract(raw));

        let mut fields = FieldMap::new();
        let mut failures = Vec::new();

        for mapping in &self.profile.fields {
            let raw = record.get(&mapping.source);
            let value = self.coercer.coerce(mapping.field_type, raw);
            if value.is_none() && raw.is_some_and(|r| !r.trim().is_empty()) {
                failures.push(mapping.target.clone());
            }
            fields.insert(mapping.target.clone(), value);
        }

        let typed = TypedRow {
            job_id,
            source_row: record.row(),
            fingerprint: record.fingerprint(),
            fields,
        };
        (typed, failures)
    }

    /// Clean one batch of raw rows.
    ///
    /// Fails only on an empty batch or on configured columns that no row
    /// carries. Every per-row problem is counted in the report instead.
    pub fn run(&self, records: &[RawRecord]) -> PipelineResult<CleanOutput> {
        if records.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let mut report = QualityReport::new(self.policy().name());
        report.rows.input = records.len();

        // Null tokens
        let rows = normalize_null_tokens(records.to_vec(), &self.profile.null_tokens);

        // Column checks
        let headers = observed_columns(&rows);
        let key_column = self.profile.resolve_key_column(&headers);
        match key_column {
            Some(ref col) => log_info(format!("🔑 Key column: {}", col)),
            None => log_warning("No URL-like column found; every row will lack a job_id"),
        }
        self.profile.validate_columns(&rows, key_column.as_deref())?;
        report.measure_columns(&rows);

        // Summary rows
        let rows = if self.profile.drop_summary_rows {
            let (kept, removed) = remove_summary_rows(rows);
            if removed > 0 {
                log_info(format!("Removed {} summary row(s)", removed));
            }
            report.rows.summary_rows_removed = removed;
            kept
        } else {
            rows
        };

        // Stage A
        let natural_key = self
            .profile
            .raw_dedup
            .natural_key
            .clone()
            .or_else(|| key_column.clone());
        let rows = match natural_key {
            Some(ref natural) if self.profile.raw_dedup.enabled => {
                log_info(format!("🔄 Raw deduplication on '{}' by {}", natural, self.raw_dedup.order()));
                let outcome = self.raw_dedup.dedup_raw(rows, natural, &self.coercer);
                report.rows.raw_duplicates_removed = outcome.removed;
                log_info_indent(format!("{} re-scraped row(s) removed", outcome.removed), 1);
                outcome.kept
            }
            _ => rows,
        };

        // Key extraction and coercion
        log_info("⚙️  Extracting keys and coercing types...");
        let typed: Vec<TypedRow> = rows
            .iter()
            .map(|r| {
                let (row, failures) = self.canonicalize(r, key_column.as_deref());
                for field in failures {
                    report.field_mut(&field).coercion_failures += 1;
                }
                row
            })
            .collect();

        // Statistics over every typed row, keyed or not
        let statistics = self
            .aggregator
            .aggregate_partitioned(&typed, self.profile.stats_partitions);
        log_success(format!("Statistics computed over {} rows", statistics.rows()));

        // Key exclusion
        let before = typed.len();
        let canonical: Vec<CanonicalRecord> = typed.into_iter().filter_map(TypedRow::into_canonical).collect();
        report.rows.missing_key_excluded = before - canonical.len();
        if report.rows.missing_key_excluded > 0 {
            log_warning(format!("{} row(s) without job_id excluded", report.rows.missing_key_excluded));
        }

        // Stage B
        let outcome = self.final_dedup.dedup_canonical(canonical);
        report.rows.key_collisions_resolved = outcome.removed;
        if outcome.removed > 0 {
            log_info(format!("{} job_id collision(s) resolved by {}", outcome.removed, self.final_dedup.order()));
        }

        // Imputation and derived fields
        let (imputed, tallies) = self.imputer.impute_all(outcome.kept, &statistics);
        report.record_imputations(tallies);
        log_info(format!("Imputed {} value(s) under {} policy", report.imputed_total(), self.policy().name()));

        let mut output: Vec<CanonicalRecord> = imputed.into_iter().map(|r| self.derive.apply(r)).collect();
        output.sort_by_key(|r| r.job_id);
        report.rows.output = output.len();

        report.annotate_columns(&self.profile, key_column.as_deref(), &statistics);

        if self.validate {
            self.validate_output(&output, &mut report);
        }

        log_success(format!("{} canonical job record(s)", output.len()));

        Ok(CleanOutput {
            records: output,
            statistics,
            report,
            csv_info: None,
        })
    }

    fn validate_output(&self, output: &[CanonicalRecord], report: &mut QualityReport) {
        log_info("✔️  Validating output rows...");
        let values: Vec<Value> = output.iter().map(CanonicalRecord::to_value).collect();
        let summary = validate_rows(&values, 3);

        report.schema_violations = summary.invalid;
        if summary.invalid == 0 {
            log_success(format!("All {} rows valid", summary.valid));
        } else {
            log_warning(format!("{} row(s) failed schema validation", summary.invalid));
            for (i, errs) in &summary.errors {
                log_error(format!("Row {}: {}", i, errs.join(", ")));
            }
        }
    }

    /// Clean already-parsed CSV data.
    pub fn run_parsed(&self, parsed: ParseResult) -> PipelineResult<CleanOutput> {
        log_info("📖 Reading CSV...");
        log_success(format!("Detected encoding: {}", parsed.encoding));
        log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
        log_success(format!("Read {} rows", parsed.records.len()));

        let csv_info = CsvInfo {
            encoding: parsed.encoding,
            delimiter: parsed.delimiter,
            headers: parsed.headers,
            row_count: parsed.records.len(),
        };

        let mut output = self.run(&parsed.records)?;
        output.csv_info = Some(csv_info);
        Ok(output)
    }
}

/// Clean a CSV file with encoding and delimiter auto-detection.
pub fn clean_file(path: impl AsRef<Path>, pipeline: &Pipeline) -> PipelineResult<CleanOutput> {
    let parsed = parse_csv_file_auto(path)?;
    pipeline.run_parsed(parsed)
}

/// Clean CSV bytes with encoding and delimiter auto-detection.
pub fn clean_bytes(bytes: &[u8], pipeline: &Pipeline) -> PipelineResult<CleanOutput> {
    let parsed = parse_bytes_auto(bytes)?;
    pipeline.run_parsed(parsed)
}

/// Clean several files as separate batches, earliest first.
///
/// A batch that fails or yields no job records is skipped with a warning.
/// Fails only when every batch was skipped.
pub fn clean_files<P: AsRef<Path>>(paths: &[P], pipeline: &Pipeline) -> PipelineResult<Vec<(PathBuf, CleanOutput)>> {
    let mut batches = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        log_info(format!("📄 Processing: {}", path.display()));
        match clean_file(path, pipeline) {
            Ok(output) if output.records.is_empty() => {
                log_warning(format!("Skipping {}: no job records", path.display()));
            }
            Ok(output) => batches.push((path.to_path_buf(), output)),
            Err(e) => log_warning(format!("Skipping {}: {}", path.display(), e)),
        }
    }

    if batches.is_empty() {
        return Err(PipelineError::NoUsableBatches(paths.len()));
    }
    Ok(batches)
}

/// One-shot run with the given profile and policy.
pub fn run(records: &[RawRecord], profile: CleaningProfile, policy: ImputationPolicy) -> PipelineResult<CleanOutput> {
    Pipeline::new(profile)?.with_policy(policy).run(records)
}

fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}
