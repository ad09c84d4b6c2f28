//! Flat CSV export of canonical records.

use std::io::Write;

use super::derive::DERIVED_FIELDS;
use crate::error::CsvError;
use crate::models::{CanonicalRecord, FieldValue};

/// Header: `job_id`, the profile targets in order, then derived fields.
pub fn csv_header(targets: &[String]) -> Vec<String> {
    std::iter::once("job_id".to_string())
        .chain(targets.iter().cloned())
        .chain(DERIVED_FIELDS.iter().map(|s| s.to_string()))
        .collect()
}

fn cell(value: Option<&FieldValue>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write records as CSV; nulls are empty cells.
pub fn write_csv<W: Write>(writer: W, targets: &[String], records: &[CanonicalRecord]) -> Result<(), CsvError> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(csv_header(targets))
        .map_err(|e| CsvError::new(1, format!("Cannot write header: {}", e)))?;

    for (idx, record) in records.iter().enumerate() {
        let mut row = Vec::with_capacity(targets.len() + 1 + DERIVED_FIELDS.len());
        row.push(record.job_id.to_string());
        row.extend(targets.iter().map(|t| cell(record.get(t))));

        match record.derived {
            Some(ref d) => {
                row.push(d.is_complete.to_string());
                row.push(d.customer_full_name.clone().unwrap_or_default());
                row.push(d.is_insurance_claim.to_string());
                row.push(d.job_duration_days.map(|n| n.to_string()).unwrap_or_default());
            }
            None => row.extend(std::iter::repeat(String::new()).take(DERIVED_FIELDS.len())),
        }

        wtr.write_record(&row)
            .map_err(|e| CsvError::new(idx + 2, format!("Cannot write row: {}", e)))?;
    }

    wtr.flush().map_err(|e| CsvError::new(0, format!("Cannot flush CSV output: {}", e)))?;
    Ok(())
}

/// Render records to an in-memory CSV string.
pub fn to_csv_string(targets: &[String], records: &[CanonicalRecord]) -> Result<String, CsvError> {
    let mut buf = Vec::new();
    write_csv(&mut buf, targets, records)?;
    String::from_utf8(buf).map_err(|e| CsvError::new(0, format!("Invalid UTF-8 in CSV output: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::derive::DerivedFieldCalculator;

    #[test]
    fn test_csv_export() {
        let rec = DerivedFieldCalculator::default().apply(
            CanonicalRecord::new(42, 0)
                .with_field("first_name", Some(FieldValue::Text("Doe, Jane".into())))
                .with_field("amount", Some(FieldValue::Float(12.5))),
        );
        let targets = vec!["first_name".to_string(), "amount".to_string(), "status".to_string()];
        let csv = to_csv_string(&targets, &[rec]).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("job_id,first_name,amount,status,is_complete,customer_full_name,is_insurance_claim,job_duration_days")
        );
        assert_eq!(lines.next(), Some("42,\"Doe, Jane\",12.5,,false,\"Doe, Jane\",false,"));
    }
}
