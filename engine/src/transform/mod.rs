//! Reconciliation and cleaning.
//!
//! - Profile: raw to canonical mapping and every tunable policy
//! - Key, Coerce: job id extraction and safe casts
//! - Stats, Dedup, Impute, Derive: the cleaning stages
//! - Merge, Report, Export: multi-batch output handling
//! - Pipeline: orchestration

pub mod coerce;
pub mod dedup;
pub mod derive;
pub mod export;
pub mod impute;
pub mod key;
pub mod merge;
pub mod pipeline;
pub mod prefilter;
pub mod profile;
pub mod report;
pub mod stats;

pub use coerce::{coerce_datetime, coerce_float, coerce_string, TypeCoercer};
pub use dedup::{DedupOrder, DedupOutcome, Deduplicator};
pub use derive::{DerivedFieldCalculator, DERIVED_FIELDS};
pub use export::{to_csv_string, write_csv};
pub use impute::{FillSource, ImputationPolicy, ImputationTally, Imputer};
pub use key::{DigitRunExtractor, KeyExtractor};
pub use merge::combine_first;
pub use pipeline::{clean_bytes, clean_file, clean_files, run, CleanOutput, CsvInfo, Pipeline};
pub use prefilter::{is_summary_row, remove_summary_rows};
pub use profile::{default_profile, CleaningProfile, FieldMapping, PolicyMode};
pub use report::{ColumnAction, QualityReport};
pub use stats::{Aggregate, StatisticsAggregator, StatisticsSnapshot, StatsAccumulator};
