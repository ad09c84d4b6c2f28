use std::collections::HashSet;
use std::fs;

use jobclean::api::logs::LOG_BROADCASTER;
use jobclean::{
    clean_bytes, clean_file, clean_files, combine_first, default_profile, CleaningProfile, ConfigError, FieldMapping, FieldType, ImputationPolicy,
    Pipeline, PipelineError, RawRecord,
};
use tempfile::tempdir;

const HEADER: &str = "Job Link,First Name,Last Name,Address,City,State,Status,Job Type,Sales Rep,Insurance Company,Contract Amount,Amount Paid,Balance Due,Date Created,Date Completed,Last Updated";

fn quiet() {
    LOG_BROADCASTER.set_quiet(true);
}

fn raw(row: usize, cells: &[(&str, Option<&str>)]) -> RawRecord {
    RawRecord::new(row, cells.iter().map(|(k, v)| (*k, v.map(String::from))))
}

fn job_profile() -> CleaningProfile {
    let mut profile = CleaningProfile::with_fields(vec![
        FieldMapping::new("First Name", "first_name", FieldType::String),
        FieldMapping::new("Last Name", "last_name", FieldType::String),
        FieldMapping::new("Address", "address", FieldType::String),
        FieldMapping::new("Status", "status", FieldType::String),
        FieldMapping::new("Salary", "salary", FieldType::Float),
        FieldMapping::new("Date Created", "date_created", FieldType::DateTime),
        FieldMapping::new("Date Completed", "date_completed", FieldType::DateTime),
    ]);
    profile.key.source = Some("Job Link".into());
    profile.key.anchor = Some("/job/".into());
    profile.derived.claim_field = None;
    profile.imputation.conservative_fields = vec!["status".into()];
    profile
}

fn job_row(row: usize, link: &str, status: Option<&str>, salary: Option<&str>) -> RawRecord {
    raw(
        row,
        &[
            ("Job Link", Some(link)),
            ("First Name", Some("Ada")),
            ("Last Name", Some("Lovelace")),
            ("Address", Some("12 Analytical Way")),
            ("Status", status),
            ("Salary", salary),
            ("Date Created", Some("03/01/2024 9:00AM")),
            ("Date Completed", Some("03/10/2024 4:45PM")),
        ],
    )
}

#[test]
fn test_smaller_fingerprint_survives_collision() {
    quiet();
    let x = job_row(0, "https://crm.example.com/job/100", Some("X"), Some("1")).with_fingerprint(17);
    let y = job_row(1, "https://crm.example.com/job/100?tab=notes", Some("Y"), Some("2")).with_fingerprint(5);

    let pipeline = Pipeline::new(job_profile()).unwrap();

    for rows in [vec![x.clone(), y.clone()], vec![y, x]] {
        let out = pipeline.run(&rows).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].job_id, 100);
        assert_eq!(out.records[0].text("status"), Some("Y"));
        assert_eq!(out.records[0].fingerprint, 5);
        assert_eq!(out.report.rows.key_collisions_resolved, 1);
    }
}

#[test]
fn test_repeated_runs_pick_same_survivors() {
    quiet();
    let rows: Vec<RawRecord> = (0..40)
        .map(|i| {
            let link = format!("https://crm.example.com/job/{}?v={}", i % 7, i);
            let status = format!("S{}", i % 3);
            let salary = format!("{}", 1000 + i);
            job_row(i, &link, Some(status.as_str()), Some(salary.as_str()))
        })
        .collect();
    let mut shuffled = rows.clone();
    shuffled.reverse();
    shuffled.rotate_left(11);

    let pipeline = Pipeline::new(job_profile()).unwrap();
    let first = pipeline.run(&rows).unwrap().to_values();
    let second = pipeline.run(&rows).unwrap().to_values();
    let permuted = pipeline.run(&shuffled).unwrap().to_values();

    assert_eq!(first, second);
    assert_eq!(first.len(), 7);
    // Survivors depend on content, not on input order
    let survivors = |values: &[serde_json::Value]| -> Vec<(i64, String)> {
        values
            .iter()
            .map(|v| (v["job_id"].as_i64().unwrap(), v["salary"].to_string()))
            .collect()
    };
    assert_eq!(survivors(&first), survivors(&permuted));
}

#[test]
fn test_job_ids_unique_and_present() {
    quiet();
    let mut rows: Vec<RawRecord> = (0..20)
        .map(|i| job_row(i, &format!("/job/{}?r={}", i % 5, i), Some("Open"), None))
        .collect();
    rows.push(job_row(20, "https://crm.example.com/jobs/", Some("Open"), None));

    let out = Pipeline::new(job_profile()).unwrap().run(&rows).unwrap();

    let ids: HashSet<i64> = out.records.iter().map(|r| r.job_id).collect();
    assert_eq!(ids.len(), out.records.len());
    assert_eq!(out.report.rows.missing_key_excluded, 1);
    for value in out.to_values() {
        assert!(value["job_id"].is_i64());
    }
}

#[test]
fn test_median_salary_by_policy() {
    quiet();
    let rows = vec![
        job_row(0, "/job/1", Some("Open"), Some("$40,000")),
        job_row(1, "/job/2", Some("Open"), Some("$50,000")),
        job_row(2, "/job/3", None, Some("$60,000")),
        job_row(3, "/job/4", Some("Closed"), None),
    ];

    let strict = Pipeline::new(job_profile())
        .unwrap()
        .with_policy(ImputationPolicy::Strict)
        .run(&rows)
        .unwrap();
    let job4 = strict.records.iter().find(|r| r.job_id == 4).unwrap();
    assert_eq!(job4.float("salary"), Some(50000.0));

    let conservative = Pipeline::new(job_profile())
        .unwrap()
        .with_policy(ImputationPolicy::conservative(["status"]))
        .run(&rows)
        .unwrap();
    let job4 = conservative.records.iter().find(|r| r.job_id == 4).unwrap();
    assert_eq!(job4.float("salary"), None);
    let job3 = conservative.records.iter().find(|r| r.job_id == 3).unwrap();
    assert_eq!(job3.text("status"), Some("Open"));
}

#[test]
fn test_duration_days() {
    quiet();
    let open = raw(
        1,
        &[
            ("Job Link", Some("/job/2")),
            ("First Name", Some("Alan")),
            ("Last Name", None),
            ("Address", None),
            ("Status", Some("Open")),
            ("Salary", None),
            ("Date Created", Some("2024-03-01")),
            ("Date Completed", Some("garbage")),
        ],
    );
    let rows = vec![job_row(0, "/job/1", Some("Done"), Some("1")), open];

    // Names stay null so completeness reflects the raw row
    let out = Pipeline::new(job_profile())
        .unwrap()
        .with_policy(ImputationPolicy::conservative(["status"]))
        .run(&rows)
        .unwrap();
    let done = out.records[0].derived.as_ref().unwrap();
    assert_eq!(done.job_duration_days, Some(9));
    assert!(done.is_complete);

    let open = out.records[1].derived.as_ref().unwrap();
    assert_eq!(open.job_duration_days, None);
    assert!(!open.is_complete);
    assert_eq!(open.customer_full_name.as_deref(), Some("Alan"));
}

#[test]
fn test_configuration_errors() {
    quiet();
    let pipeline = Pipeline::new(job_profile()).unwrap();

    assert!(matches!(pipeline.run(&[]), Err(PipelineError::EmptyInput)));

    let rows = vec![raw(0, &[("Job Link", Some("/job/1")), ("First Name", Some("Ada"))])];
    match pipeline.run(&rows) {
        Err(PipelineError::Config(ConfigError::MissingColumns { columns })) => {
            assert!(columns.contains(&"Salary".to_string()));
            assert!(!columns.contains(&"First Name".to_string()));
        }
        other => panic!("expected MissingColumns, got {:?}", other.map(|o| o.records.len())),
    }
}

#[test]
fn test_partitioned_statistics_match() {
    quiet();
    let rows: Vec<RawRecord> = (0..25)
        .map(|i| {
            let status = ["Open", "Closed", "Lead"][i % 3];
            let salary = if i % 4 == 0 { None } else { Some(format!("{}", i * 100)) };
            job_row(i, &format!("/job/{}", i), Some(status), salary.as_deref())
        })
        .collect();

    let sequential = Pipeline::new(job_profile()).unwrap().run(&rows).unwrap();

    let mut profile = job_profile();
    profile.stats_partitions = 4;
    let parallel = Pipeline::new(profile).unwrap().run(&rows).unwrap();

    assert_eq!(sequential.statistics, parallel.statistics);
    assert_eq!(sequential.to_values(), parallel.to_values());
}

#[test]
fn test_files_merge_across_batches() {
    quiet();
    let dir = tempdir().unwrap();

    let first = dir.path().join("march.csv");
    fs::write(
        &first,
        format!(
            "{}\n\
https://crm.example.com/job/100,Ada,Lovelace,12 Way,Austin,TX,Open,Roof,Sam,,$1000,$0,$1000,03/01/2024,,03/02/2024\n\
https://crm.example.com/job/101,Alan,Turing,1 Loop,Austin,TX,Open,Roof,Sam,Acme,$500,$0,$500,03/01/2024,,03/02/2024\n",
            HEADER
        ),
    )
    .unwrap();

    let second = dir.path().join("april.csv");
    fs::write(
        &second,
        format!(
            "{}\n\
https://crm.example.com/job/100,Ada,Lovelace,12 Way,Austin,TX,Complete,Roof,Sam,Acme,$1000,$1000,$0,03/01/2024,04/02/2024,04/02/2024\n\
https://crm.example.com/job/102,Grace,Hopper,9 Bug St,Austin,TX,Lead,Siding,Kim,,$800,$0,$800,04/01/2024,,04/01/2024\n",
            HEADER
        ),
    )
    .unwrap();

    let mut profile = default_profile();
    profile.imputation.mode = jobclean::PolicyMode::Conservative;
    let profile_path = dir.path().join("profile.json");
    fs::write(&profile_path, profile.to_json().unwrap()).unwrap();

    let loaded = CleaningProfile::from_file(&profile_path).unwrap();
    let pipeline = Pipeline::new(loaded).unwrap();
    assert_eq!(pipeline.policy().name(), "conservative");

    let a = clean_file(&first, &pipeline).unwrap();
    let b = clean_file(&second, &pipeline).unwrap();
    let merged = combine_first(vec![a.records, b.records], pipeline.derive());

    let ids: Vec<i64> = merged.iter().map(|r| r.job_id).collect();
    assert_eq!(ids, vec![100, 101, 102]);

    let job100 = &merged[0];
    // Earliest batch wins; its nulls are filled from the later one
    assert_eq!(job100.text("status"), Some("Open"));
    assert_eq!(job100.text("insurance_company"), Some("Acme"));
    let derived = job100.derived.as_ref().unwrap();
    assert!(derived.is_insurance_claim);
    assert_eq!(derived.job_duration_days, Some(32));
}

#[test]
fn test_rescrapes_with_equal_timestamps_resolve_by_content() {
    quiet();
    let open = "https://crm.example.com/job/100,Ada,Lovelace,12 Way,Austin,TX,Open,Roof,Sam,Acme,$1000,$0,$1000,03/01/2024,,03/05/2024 10:00AM";
    let closed = "https://crm.example.com/job/100,Ada,Lovelace,12 Way,Austin,TX,Closed,Roof,Sam,Acme,$1000,$0,$1000,03/01/2024,,03/05/2024 10:00AM";

    let pipeline = Pipeline::new(default_profile()).unwrap();
    let status_for = |first: &str, second: &str| {
        let csv = format!("{}\n{}\n{}\n", HEADER, first, second);
        let out = clean_bytes(csv.as_bytes(), &pipeline).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.report.rows.raw_duplicates_removed, 1);
        out.records[0].text("status").map(String::from)
    };

    assert_eq!(status_for(open, closed), status_for(closed, open));
}

#[test]
fn test_failed_batch_is_skipped() {
    quiet();
    let dir = tempdir().unwrap();

    let good = dir.path().join("good.csv");
    fs::write(
        &good,
        format!(
            "{}\nhttps://crm.example.com/job/7,Ada,Lovelace,12 Way,Austin,TX,Open,Roof,Sam,,$10,$0,$10,03/01/2024,,03/02/2024\n",
            HEADER
        ),
    )
    .unwrap();
    let broken = dir.path().join("broken.csv");
    fs::write(&broken, "Job Link,Status\nhttps://crm.example.com/job/8,Open\n").unwrap();
    let keyless = dir.path().join("keyless.csv");
    fs::write(
        &keyless,
        format!(
            "{}\nhttps://crm.example.com/jobs/,Ada,Lovelace,12 Way,Austin,TX,Open,Roof,Sam,,$10,$0,$10,03/01/2024,,03/02/2024\n",
            HEADER
        ),
    )
    .unwrap();
    let missing = dir.path().join("missing.csv");

    let pipeline = Pipeline::new(default_profile()).unwrap();

    let batches = clean_files(&[broken.clone(), good.clone(), keyless.clone(), missing.clone()], &pipeline).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, good);
    assert_eq!(batches[0].1.records[0].job_id, 7);

    match clean_files(&[broken, keyless, missing], &pipeline) {
        Err(PipelineError::NoUsableBatches(3)) => {}
        other => panic!("expected NoUsableBatches, got {:?}", other.map(|b| b.len())),
    }
}
