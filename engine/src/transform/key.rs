//! Job identifier extraction
//!
//! A key extractor turns a URL-like raw value into an integer job id.
//! Absence of a key is an expected outcome, never an error.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConfigError, ConfigResult};

static FIRST_DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digit-run pattern"));

/// Pulls a job identifier out of a raw field.
///
/// Implemented for any `Fn(&str) -> Option<i64>`, so alternate URL shapes
/// can be plugged into the pipeline with a closure.
pub trait KeyExtractor: Send + Sync {
    fn extract(&self, raw: &str) -> Option<i64>;
}

impl<F> KeyExtractor for F
where
    F: Fn(&str) -> Option<i64> + Send + Sync,
{
    fn extract(&self, raw: &str) -> Option<i64> {
        self(raw)
    }
}

/// Extracts the first run of ASCII digits, optionally only where it
/// directly follows a literal anchor such as `/job/`.
#[derive(Debug, Clone)]
pub struct DigitRunExtractor {
    pattern: Regex,
    anchored: bool,
}

impl DigitRunExtractor {
    /// First digit run anywhere in the value.
    pub fn new() -> Self {
        Self {
            pattern: FIRST_DIGIT_RUN.clone(),
            anchored: false,
        }
    }

    /// First digit run directly after `anchor`. Values without the anchor yield no key.
    pub fn anchored(anchor: &str) -> ConfigResult<Self> {
        if anchor.is_empty() {
            return Err(ConfigError::InvalidAnchor {
                anchor: anchor.to_string(),
                message: "anchor must not be empty".to_string(),
            });
        }

        let pattern = Regex::new(&format!(r"{}(\d+)", regex::escape(anchor))).map_err(|e| {
            ConfigError::InvalidAnchor {
                anchor: anchor.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            pattern,
            anchored: true,
        })
    }

    /// Build from an optional anchor.
    pub fn from_anchor(anchor: Option<&str>) -> ConfigResult<Self> {
        match anchor {
            Some(a) => Self::anchored(a),
            None => Ok(Self::new()),
        }
    }
}

impl Default for DigitRunExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyExtractor for DigitRunExtractor {
    fn extract(&self, raw: &str) -> Option<i64> {
        let digits = if self.anchored {
            self.pattern.captures(raw)?.get(1)?.as_str()
        } else {
            self.pattern.find(raw)?.as_str()
        };
        // Runs too long for i64 are treated as absent
        digits.parse::<i64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_digit_run() {
        let ex = DigitRunExtractor::new();
        assert_eq!(ex.extract("https://crm.example.com/job/48213/edit"), Some(48213));
        assert_eq!(ex.extract("job 7 of 9"), Some(7));
        assert_eq!(ex.extract("no digits here"), None);
        assert_eq!(ex.extract(""), None);
    }

    #[test]
    fn test_anchored() {
        let ex = DigitRunExtractor::anchored("/job/").unwrap();
        assert_eq!(ex.extract("https://crm2.example.com/job/100?tab=2"), Some(100));
        // The host digit run is skipped
        assert_eq!(ex.extract("https://crm2.example.com/jobs/100"), None);
        assert_eq!(ex.extract("https://crm2.example.com/job/abc"), None);
    }

    #[test]
    fn test_anchor_is_literal() {
        let ex = DigitRunExtractor::anchored("id=").unwrap();
        assert_eq!(ex.extract("/view?id=55&x=1"), Some(55));

        let dotted = DigitRunExtractor::anchored("v1.").unwrap();
        assert_eq!(dotted.extract("v1x2"), None);
        assert_eq!(dotted.extract("v1.2"), Some(2));
    }

    #[test]
    fn test_overflow_is_absent() {
        let ex = DigitRunExtractor::new();
        assert_eq!(ex.extract("/job/99999999999999999999999"), None);
    }

    #[test]
    fn test_empty_anchor_rejected() {
        assert!(DigitRunExtractor::anchored("").is_err());
    }

    #[test]
    fn test_closure_extractor() {
        let ex = |raw: &str| raw.strip_prefix("JOB-").and_then(|s| s.parse::<i64>().ok());
        let boxed: Box<dyn KeyExtractor> = Box::new(ex);
        assert_eq!(boxed.extract("JOB-42"), Some(42));
        assert_eq!(boxed.extract("42"), None);
    }
}
