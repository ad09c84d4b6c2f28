//! Safe type coercion
//!
//! Every conversion is a pure function from a raw string to a typed value
//! or null. Nothing here fails.

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{FieldType, FieldValue};
use super::profile::{default_date_formats, CleaningProfile};

/// Coerces raw strings into typed field values.
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    date_formats: Vec<String>,
    empty_string_is_null: bool,
}

impl TypeCoercer {
    pub fn new(date_formats: Vec<String>, empty_string_is_null: bool) -> Self {
        Self {
            date_formats,
            empty_string_is_null,
        }
    }

    pub fn from_profile(profile: &CleaningProfile) -> Self {
        Self::new(profile.date_formats.clone(), profile.empty_string_is_null)
    }

    pub fn date_formats(&self) -> &[String] {
        &self.date_formats
    }

    /// Coerce a raw value to the declared type; `None` in, `None` out.
    pub fn coerce(&self, field_type: FieldType, raw: Option<&str>) -> Option<FieldValue> {
        let raw = raw?;
        match field_type {
            FieldType::String => coerce_string(raw, self.empty_string_is_null).map(FieldValue::Text),
            FieldType::Float => coerce_float(raw).map(FieldValue::Float),
            FieldType::DateTime => self.datetime(raw).map(FieldValue::DateTime),
        }
    }

    pub fn datetime(&self, raw: &str) -> Option<NaiveDateTime> {
        coerce_datetime(raw, &self.date_formats)
    }
}

impl Default for TypeCoercer {
    fn default() -> Self {
        Self::new(default_date_formats(), true)
    }
}

/// Keep digits, `.` and signs, then parse.
///
/// `"$1,234.56"` becomes `1234.56`; `"N/A"` has nothing left and is null.
pub fn coerce_float(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Trim; an empty result is null when `empty_is_null` is set.
pub fn coerce_string(raw: &str, empty_is_null: bool) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() && empty_is_null {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Try each pattern in order; date-only patterns yield midnight.
pub fn coerce_datetime(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(trimmed, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(trimmed, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn test_currency_to_float() {
        assert_eq!(coerce_float("$1,234.56"), Some(1234.56));
        assert_eq!(coerce_float(" -42 "), Some(-42.0));
        assert_eq!(coerce_float("USD 300"), Some(300.0));
    }

    #[test]
    fn test_unparseable_float_is_null() {
        assert_eq!(coerce_float("N/A"), None);
        assert_eq!(coerce_float(""), None);
        assert_eq!(coerce_float("1.2.3"), None);
        assert_eq!(coerce_float("--"), None);
    }

    #[test]
    fn test_string_trim() {
        assert_eq!(coerce_string("  Open  ", true), Some("Open".to_string()));
        assert_eq!(coerce_string("   ", true), None);
        assert_eq!(coerce_string("   ", false), Some(String::new()));
    }

    #[test]
    fn test_us_datetime_with_meridiem() {
        let formats = default_date_formats();
        assert_eq!(coerce_datetime("01/15/2024 3:30PM", &formats), Some(at(2024, 1, 15, 15, 30)));
        assert_eq!(coerce_datetime("01/15/2024 3:30 am", &formats), Some(at(2024, 1, 15, 3, 30)));
        assert_eq!(coerce_datetime("12/01/2023 12:05AM", &formats), Some(at(2023, 12, 1, 0, 5)));
    }

    #[test]
    fn test_date_only_and_iso() {
        let formats = default_date_formats();
        assert_eq!(coerce_datetime("03/10/2024", &formats), Some(at(2024, 3, 10, 0, 0)));
        assert_eq!(coerce_datetime("2024-03-01", &formats), Some(at(2024, 3, 1, 0, 0)));
        assert_eq!(coerce_datetime("2024-03-01T08:15:00", &formats), Some(at(2024, 3, 1, 8, 15)));
    }

    #[test]
    fn test_garbage_datetime_is_null() {
        let formats = default_date_formats();
        assert_eq!(coerce_datetime("garbage", &formats), None);
        assert_eq!(coerce_datetime("13/45/2024", &formats), None);
        assert_eq!(coerce_datetime("", &formats), None);
    }

    #[test]
    fn test_first_matching_format_wins() {
        // Day-first pattern listed before month-first
        let formats = vec!["%d/%m/%Y".to_string(), "%m/%d/%Y".to_string()];
        assert_eq!(coerce_datetime("02/03/2024", &formats), Some(at(2024, 3, 2, 0, 0)));
    }

    #[test]
    fn test_coerce_dispatch() {
        let c = TypeCoercer::default();
        assert_eq!(c.coerce(FieldType::Float, Some("$10")), Some(FieldValue::Float(10.0)));
        assert_eq!(c.coerce(FieldType::String, Some(" x ")), Some(FieldValue::Text("x".into())));
        assert_eq!(c.coerce(FieldType::DateTime, Some("nope")), None);
        assert_eq!(c.coerce(FieldType::Float, None), None);
    }
}
