//! Jobclean CLI - Reconcile and clean job-record CSV exports
//!
//! # Main Commands
//!
//! ```bash
//! jobclean clean export.csv -o jobs.json        # Clean one export
//! jobclean clean a.csv b.csv --policy conservative --csv jobs.csv
//! jobclean serve                                # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! jobclean parse export.csv        # Just parse CSV to JSON
//! jobclean validate jobs.json      # Validate canonical rows against schema
//! jobclean profile                 # Print the default cleaning profile
//! ```
//!
//! `JOBCLEAN_PROFILE` names a profile file used when `--profile` is absent;
//! `JOBCLEAN_PORT` sets the default server port. Both may come from `.env`.

use clap::{Parser, Subcommand, ValueEnum};
use jobclean::api::logs::{log_info, LOG_BROADCASTER};
use jobclean::transform::{clean_files, combine_first, default_profile, to_csv_string, Pipeline};
use jobclean::{parse_csv_file_auto, validate_canonical, CleaningProfile, PolicyMode};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_PORT: u16 = 3000;

#[derive(Parser)]
#[command(name = "jobclean")]
#[command(about = "Reconcile and clean raw job-record exports into canonical rows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Strict,
    Conservative,
}

impl From<PolicyArg> for PolicyMode {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Strict => PolicyMode::Strict,
            PolicyArg::Conservative => PolicyMode::Conservative,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Clean one or more CSV exports and merge them on job_id
    Clean {
        /// Input CSV files, earliest batch first
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Cleaning profile JSON (default: $JOBCLEAN_PROFILE or built-in)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Imputation policy (default: the profile's)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Fields the conservative policy fills, comma-separated
        #[arg(long, value_delimiter = ',')]
        conservative_fields: Option<Vec<String>>,

        /// Output JSON file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write canonical rows as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the quality report
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write the statistics snapshot
        #[arg(long)]
        stats: Option<PathBuf>,

        /// Skip schema validation of output rows
        #[arg(long)]
        no_validate: bool,

        /// Suppress progress logs
        #[arg(short, long)]
        quiet: bool,
    },

    /// Parse a CSV file and output raw rows as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate canonical JSON rows against the output schema
    Validate {
        /// Input JSON file (array of rows)
        input: PathBuf,
    },

    /// Print the default cleaning profile
    Profile,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: $JOBCLEAN_PORT or 3000)
        #[arg(long)]
        port: Option<u16>,

        /// Cleaning profile JSON (default: $JOBCLEAN_PROFILE or built-in)
        #[arg(short, long)]
        profile: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Clean {
            inputs,
            profile,
            policy,
            conservative_fields,
            output,
            csv,
            report,
            stats,
            no_validate,
            quiet,
        } => cmd_clean(CleanArgs {
            inputs,
            profile,
            policy: policy.map(PolicyMode::from),
            conservative_fields,
            output,
            csv,
            report,
            stats,
            validate: !no_validate,
            quiet,
        }),

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Profile => cmd_profile(),

        Commands::Serve { port, profile } => cmd_serve(port, profile.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

struct CleanArgs {
    inputs: Vec<PathBuf>,
    profile: Option<PathBuf>,
    policy: Option<PolicyMode>,
    conservative_fields: Option<Vec<String>>,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
    report: Option<PathBuf>,
    stats: Option<PathBuf>,
    validate: bool,
    quiet: bool,
}

/// Profile from the flag, then `JOBCLEAN_PROFILE`, then the built-in default.
fn load_profile(path: Option<&Path>) -> Result<CleaningProfile, Box<dyn std::error::Error>> {
    let from_env = std::env::var("JOBCLEAN_PROFILE").ok().filter(|p| !p.trim().is_empty());

    let profile = match (path, from_env) {
        (Some(p), _) => CleaningProfile::from_file(p)?,
        (None, Some(p)) => CleaningProfile::from_file(&p)?,
        (None, None) => default_profile(),
    };
    Ok(profile)
}

fn cmd_clean(args: CleanArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Rows on stdout must not interleave with progress lines
    LOG_BROADCASTER.set_quiet(args.quiet || args.output.is_none());

    let mut profile = load_profile(args.profile.as_deref())?;
    if let Some(fields) = args.conservative_fields {
        profile.imputation.conservative_fields = fields;
    }
    let policy = profile.imputation.policy_for(args.policy.unwrap_or(profile.imputation.mode));

    let pipeline = Pipeline::new(profile)?
        .with_policy(policy)
        .with_validation(args.validate);

    let outputs = clean_files(&args.inputs, &pipeline)?;

    let records = if outputs.len() == 1 {
        outputs[0].1.records.clone()
    } else {
        log_info(format!("📦 Merging {} batches on job_id", outputs.len()));
        let batches = outputs.iter().map(|(_, o)| o.records.clone()).collect();
        combine_first(batches, pipeline.derive())
    };

    for (input, output) in &outputs {
        let rows = &output.report.rows;
        eprintln!(
            "📊 {}: {} in, {} summary, {} re-scraped, {} without job_id, {} collisions, {} out",
            input.display(),
            rows.input,
            rows.summary_rows_removed,
            rows.raw_duplicates_removed,
            rows.missing_key_excluded,
            rows.key_collisions_resolved,
            rows.output
        );
    }

    if let Some(ref path) = args.report {
        let reports: Vec<Value> = outputs
            .iter()
            .map(|(input, o)| json!({ "input": input.display().to_string(), "report": o.report }))
            .collect();
        fs::write(path, serde_json::to_string_pretty(&reports)?)?;
        eprintln!("💾 Report written to: {}", path.display());
    }

    if let Some(ref path) = args.stats {
        let stats: Vec<Value> = outputs
            .iter()
            .map(|(input, o)| json!({ "input": input.display().to_string(), "statistics": o.statistics }))
            .collect();
        fs::write(path, serde_json::to_string_pretty(&stats)?)?;
        eprintln!("💾 Statistics written to: {}", path.display());
    }

    if let Some(ref path) = args.csv {
        fs::write(path, to_csv_string(&pipeline.profile().targets(), &records)?)?;
        eprintln!("💾 CSV written to: {}", path.display());
    }

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, args.output.as_deref())?;

    eprintln!("✨ {} canonical job record(s)", records.len());
    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let rows: Vec<Value> = result.records.iter().map(|r| r.to_value()).collect();
    let json = serde_json::to_string_pretty(&rows)?;
    write_output(&json, output)?;

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let records: Vec<Value> = serde_json::from_str(&content)?;

    let mut valid = 0;
    let mut invalid = 0;

    for (i, record) in records.iter().enumerate() {
        match validate_canonical(record) {
            Ok(()) => valid += 1,
            Err(errors) => {
                invalid += 1;
                if invalid <= 5 {
                    eprintln!("\n❌ Record {} invalid:", i);
                    for err in errors.iter().take(3) {
                        eprintln!("   - {}", err);
                    }
                }
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_profile() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", default_profile().to_json()?);
    Ok(())
}

async fn cmd_serve(port: Option<u16>, profile: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let port = match port {
        Some(p) => p,
        None => match std::env::var("JOBCLEAN_PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| format!("Invalid JOBCLEAN_PORT '{}': {}", raw, e))?,
            Err(_) => DEFAULT_PORT,
        },
    };

    let profile = load_profile(profile)?;
    profile.validate()?;
    jobclean::server::start_server(port, profile).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
